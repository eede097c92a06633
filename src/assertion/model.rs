use serde::{Deserialize, Serialize};

/// One assertion row of a test case. Both sides are expression strings
/// resolved against the response tree; the operator is a string tag so an
/// unknown tag degrades to a failed verdict instead of a decode error.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Assertion {
    pub id: i64,
    pub name: String,
    pub assert_type: String,
    pub expected: String,
    pub actually: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AssertionVerdict {
    pub passed: bool,
    pub message: String,
}

impl AssertionVerdict {
    pub fn passed(message: impl Into<String>) -> Self {
        AssertionVerdict {
            passed: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        AssertionVerdict {
            passed: false,
            message: message.into(),
        }
    }
}
