use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeployResult {
    pub status: DeployStatus,
    pub success: bool,
}

impl DeployResult {
    pub fn success() -> Self {
        Self {
            status: DeployStatus::Success,
            success: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialized() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&DeployResult::success())?,
            r#"{"status":"success","success":true}"#,
        );
        Ok(())
    }
}
