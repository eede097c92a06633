use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Idle,
    Running,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    Email,
}

/// A named, schedulable group of cases run across one or more environments.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TestPlan {
    pub id: i64,
    pub name: String,
    pub env: Vec<i64>,
    pub case_list: Vec<i64>,
    pub receiver: Vec<i64>,
    pub msg_types: Vec<MsgType>,
    /// When true, cases run strictly one after another per environment.
    pub ordered: bool,
    pub state: PlanState,
}
