use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Result, YasspError};
use crate::models::TrafficReport;

/// Panel flavors the agent knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFlavor {
    /// `getport.php` API, token in the query string, in-body status code
    Nico,
    /// REST API with HTTP basic auth, status carried by HTTP only
    Moyu,
}

impl PanelFlavor {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nico" => Some(Self::Nico),
            "moyu" => Some(Self::Moyu),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nico => "nico",
            Self::Moyu => "moyu",
        }
    }

    /// Path and query of the profile list endpoint
    pub(crate) fn profiles_endpoint(&self) -> (&'static str, &'static [(&'static str, &'static str)]) {
        match self {
            Self::Nico => ("getport.php", &[("act", "list")]),
            Self::Moyu => ("services/", &[]),
        }
    }

    /// Path and query of the traffic upload endpoint
    pub(crate) fn traffic_endpoint(&self) -> (&'static str, &'static [(&'static str, &'static str)]) {
        match self {
            Self::Nico => ("getport.php", &[("act", "updates")]),
            Self::Moyu => ("traffics/", &[]),
        }
    }

    /// Encode a due set as the upload body
    pub(crate) fn encode_traffic(&self, report: &TrafficReport) -> Value {
        match self {
            Self::Nico => {
                let update: Vec<Value> = report
                    .increments()
                    .map(|(port, transfer)| json!({ "port": port, "transfer": transfer }))
                    .collect();
                json!({ "update": update })
            }
            Self::Moyu => {
                let deltas: Map<String, Value> = report
                    .increments()
                    .map(|(port, delta)| (port.to_string(), json!(delta)))
                    .collect();
                Value::Object(deltas)
            }
        }
    }

    /// Decide whether a successful HTTP exchange really acknowledged the upload.
    ///
    /// Nico wraps its own status code in the body and both layers must agree;
    /// moyu relies on the HTTP status alone.
    pub(crate) fn check_upload_reply(&self, reply: Option<&Value>) -> Result<()> {
        match self {
            Self::Nico => {
                let code = reply.and_then(|body| body.get("code"));
                if code.and_then(Value::as_f64) == Some(200.0) {
                    Ok(())
                } else {
                    debug!(?reply, "panel refused traffic upload");
                    Err(YasspError::UnexpectedResponse(format!(
                        "code returned by panel {} != 200",
                        code.map(Value::to_string)
                            .unwrap_or_else(|| "(none)".to_string())
                    )))
                }
            }
            Self::Moyu => Ok(()),
        }
    }
}

impl std::fmt::Display for PanelFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> TrafficReport {
        let mut report = TrafficReport::new();
        report.insert(8388, 1000, 5000);
        report.insert(8389, 42, 42);
        report
    }

    #[test]
    fn test_flavor_from_str() {
        assert_eq!(PanelFlavor::from_str("nico"), Some(PanelFlavor::Nico));
        assert_eq!(PanelFlavor::from_str(" MOYU "), Some(PanelFlavor::Moyu));
        assert_eq!(PanelFlavor::from_str("sspanel"), None);
        assert_eq!(PanelFlavor::Moyu.to_string(), "moyu");
    }

    #[test]
    fn test_nico_traffic_body() {
        let body = PanelFlavor::Nico.encode_traffic(&report());
        assert_eq!(
            body,
            json!({"update": [
                {"port": 8388, "transfer": 1000},
                {"port": 8389, "transfer": 42},
            ]})
        );
    }

    #[test]
    fn test_moyu_traffic_body() {
        let body = PanelFlavor::Moyu.encode_traffic(&report());
        assert_eq!(body, json!({"8388": 1000, "8389": 42}));
    }

    #[test]
    fn test_nico_reply_needs_code_200() {
        let flavor = PanelFlavor::Nico;
        assert!(flavor.check_upload_reply(Some(&json!({"code": 200}))).is_ok());
        assert!(flavor
            .check_upload_reply(Some(&json!({"code": 500, "msg": "db"})))
            .is_err());
        assert!(flavor.check_upload_reply(Some(&json!({"code": "200"}))).is_err());
        assert!(flavor.check_upload_reply(Some(&json!({}))).is_err());
        assert!(matches!(
            flavor.check_upload_reply(None),
            Err(YasspError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_moyu_reply_trusts_http_status() {
        assert!(PanelFlavor::Moyu.check_upload_reply(None).is_ok());
        assert!(PanelFlavor::Moyu
            .check_upload_reply(Some(&json!({"anything": true})))
            .is_ok());
    }
}
