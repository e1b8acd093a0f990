use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use experiment::RunInfo;

/// Rollout evaluations of one or more experiments, folded together.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Merged {
    /// Distinct experiment IDs, in the order they were first seen. Everything in `fields` that's
    /// grouped per experiment is indexed the same way.
    pub id: Vec<Value>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Field>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    /// For each experiment, every value seen per rollout ID
    Grouped(Vec<BTreeMap<String, Vec<Value>>>),
    /// Must be identical across everything merged, like the cycle length
    Scalar(Value),
}

impl Merged {
    pub fn scalar(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key) {
            Some(Field::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    pub fn grouped(&self, key: &str) -> Option<&Vec<BTreeMap<String, Vec<Value>>>> {
        match self.fields.get(key) {
            Some(Field::Grouped(per_experiment)) => Some(per_experiment),
            _ => None,
        }
    }
}

/// Merges rollout evaluations. Each one needs an `id` naming the experiment and a `rollout`.
/// Lists and mappings are collected per experiment and rollout; every other value must match
/// across all of the evaluations.
pub fn concat(evaluations: Vec<Map<String, Value>>) -> Result<Merged> {
    let mut merged = Merged::default();
    for (idx, mut eval) in evaluations.into_iter().enumerate() {
        let id = eval
            .remove("id")
            .ok_or_else(|| anyhow!("evaluation {} has no id", idx))?;
        let rollout = eval
            .remove("rollout")
            .ok_or_else(|| anyhow!("evaluation {} has no rollout", idx))?;
        let rollout = rollout_key(&rollout).with_context(|| format!("evaluation {}", idx))?;

        let ex_idx = match merged.id.iter().position(|x| same_scalar(x, &id)) {
            Some(i) => i,
            None => {
                merged.id.push(id);
                merged.id.len() - 1
            }
        };

        for (key, value) in eval {
            if value.is_array() || value.is_object() {
                let field = merged
                    .fields
                    .entry(key.clone())
                    .or_insert_with(|| Field::Grouped(Vec::new()));
                match field {
                    Field::Grouped(per_experiment) => {
                        // An experiment might be missing a key that earlier ones had
                        while per_experiment.len() <= ex_idx {
                            per_experiment.push(BTreeMap::new());
                        }
                        per_experiment[ex_idx]
                            .entry(rollout.clone())
                            .or_insert_with(Vec::new)
                            .push(value);
                    }
                    Field::Scalar(old) => {
                        bail!("key {}: {} and {} should match", key, old, value);
                    }
                }
            } else {
                match merged.fields.get(&key) {
                    Some(Field::Scalar(old)) => {
                        if !same_scalar(old, &value) {
                            bail!("key {}: {} and {} should match", key, old, value);
                        }
                    }
                    Some(Field::Grouped(_)) => {
                        bail!("key {}: expected a list or mapping, not {}", key, value);
                    }
                    None => {
                        merged.fields.insert(key, Field::Scalar(value));
                    }
                }
            }
        }
    }
    Ok(merged)
}

/// Describes one rollout of an experiment, ready for `concat`.
pub fn evaluation<O: Serialize, A: Serialize>(
    info: &RunInfo<O, A>,
    rollout: usize,
) -> Result<Map<String, Value>> {
    match serde_json::to_value(info)? {
        Value::Object(mut map) => {
            map.insert("rollout".to_string(), Value::from(rollout));
            Ok(map)
        }
        other => bail!("{} didn't serialize to a JSON object: {}", info.id, other),
    }
}

/// Numbers are equal by value, so 90 and 90.0 match.
fn same_scalar(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn rollout_key(rollout: &Value) -> Result<String> {
    match rollout {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => bail!("a rollout must be a string or number, not {}", rollout),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn eval(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object: {}", value),
        }
    }

    #[test]
    fn rollouts_of_one_experiment() {
        let merged = concat(vec![
            eval(json!({"id": "intersection", "rollout": 0, "cycle": 90.0, "rewards": [[1.0, 2.0]]})),
            eval(json!({"id": "intersection", "rollout": 1, "cycle": 90.0, "rewards": [[3.0]]})),
        ])
        .unwrap();
        assert_eq!(merged.id, vec![json!("intersection")]);
        assert_eq!(merged.scalar("cycle"), Some(&json!(90.0)));
        let rewards = merged.grouped("rewards").unwrap();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0]["0"], vec![json!([[1.0, 2.0]])]);
        assert_eq!(rewards[0]["1"], vec![json!([[3.0]])]);
    }

    #[test]
    fn experiments_are_indexed_in_order() {
        let merged = concat(vec![
            eval(json!({"id": "b", "rollout": 0, "rewards": [1]})),
            eval(json!({"id": "a", "rollout": 0, "rewards": [2]})),
            eval(json!({"id": "b", "rollout": 0, "rewards": [3]})),
        ])
        .unwrap();
        assert_eq!(merged.id, vec![json!("b"), json!("a")]);
        let rewards = merged.grouped("rewards").unwrap();
        assert_eq!(rewards[0]["0"], vec![json!([1]), json!([3])]);
        assert_eq!(rewards[1]["0"], vec![json!([2])]);
    }

    #[test]
    fn mismatched_scalars() {
        let err = concat(vec![
            eval(json!({"id": "x", "rollout": 0, "cycle": 90.0})),
            eval(json!({"id": "x", "rollout": 1, "cycle": 60.0})),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));

        assert!(concat(vec![
            eval(json!({"id": "x", "rollout": 0, "save_step": 1.0})),
            eval(json!({"id": "y", "rollout": 0, "save_step": [1.0]})),
        ])
        .is_err());
    }

    #[test]
    fn integers_match_floats() {
        let merged = concat(vec![
            eval(json!({"id": "x", "rollout": 0, "cycle": 90})),
            eval(json!({"id": "x", "rollout": 1, "cycle": 90.0})),
        ])
        .unwrap();
        assert_eq!(merged.scalar("cycle"), Some(&json!(90)));

        assert!(concat(vec![
            eval(json!({"id": "x", "rollout": 0, "cycle": 90})),
            eval(json!({"id": "x", "rollout": 1, "cycle": "90"})),
        ])
        .is_err());

        let merged = concat(vec![
            eval(json!({"id": 7, "rollout": 0})),
            eval(json!({"id": 7.0, "rollout": 1})),
        ])
        .unwrap();
        assert_eq!(merged.id, vec![json!(7)]);
    }

    #[test]
    fn required_keys() {
        assert!(concat(vec![eval(json!({"rollout": 0}))]).is_err());
        assert!(concat(vec![eval(json!({"id": "x"}))]).is_err());
        assert!(concat(vec![eval(json!({"id": "x", "rollout": [0]}))]).is_err());
        assert_eq!(concat(Vec::new()).unwrap(), Merged::default());
    }

    #[test]
    fn late_keys_line_up() {
        let merged = concat(vec![
            eval(json!({"id": "a", "rollout": 0})),
            eval(json!({"id": "b", "rollout": "r", "extra": {"k": 1}})),
        ])
        .unwrap();
        let extra = merged.grouped("extra").unwrap();
        assert_eq!(extra.len(), 2);
        assert!(extra[0].is_empty());
        assert_eq!(extra[1]["r"], vec![json!({"k": 1})]);
    }

    #[test]
    fn json_shape() {
        let merged = concat(vec![
            eval(json!({"id": "x", "rollout": 3, "cycle": 90.0, "rewards": [1]})),
        ])
        .unwrap();
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(
            value,
            json!({"id": ["x"], "cycle": 90.0, "rewards": [{"3": [[1]]}]})
        );
        let back: Merged = serde_json::from_value(value).unwrap();
        assert_eq!(back, merged);
    }

    #[test]
    fn run_info_as_evaluation() {
        let info: RunInfo<Vec<usize>, u8> = RunInfo {
            id: "intersection".to_string(),
            cycle: Some(90.0),
            save_step: 90.0,
            rewards: vec![vec![-1.5]],
            velocities: vec![vec![None]],
            vehicles: vec![vec![2.0]],
            observation_spaces: vec![vec![vec![1, 2]]],
            rl_actions: vec![vec![Some(1)]],
        };
        let map = evaluation(&info, 2).unwrap();
        assert_eq!(map["rollout"], json!(2));
        assert_eq!(map["id"], json!("intersection"));

        let merged = concat(vec![map]).unwrap();
        assert_eq!(merged.scalar("save_step"), Some(&json!(90.0)));
        assert_eq!(merged.grouped("velocities").unwrap()[0]["2"], vec![json!([[null]])]);
    }
}
