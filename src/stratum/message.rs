use {super::*, serde::ser::SerializeMap};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
#[serde(untagged)]
pub enum Id {
    Null,
    Number(u64),
    String(String),
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Message {
    Request {
        id: Id,
        method: String,
        params: Value,
    },
    Response {
        id: Id,
        result: Option<Value>,
        error: Option<JsonRpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Request { id, method, params } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                map.serialize_entry("params", params)?;
                map.end()
            }
            Self::Response { id, result, error } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("result", result)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
            // Notifications go out with an explicit null id, as miners expect.
            Self::Notification { method, params } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("id", &Id::Null)?;
                map.serialize_entry("method", method)?;
                map.serialize_entry("params", params)?;
                map.end()
            }
        }
    }
}

/// Stratum sends notifications with `id: null`, which JSON-RPC proper would
/// express by omitting the field. Both shapes are accepted here; anything
/// carrying a `method` and a non-null id is a request.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let is_response = value.get("result").is_some() || value.get("error").is_some();

        let is_notification = value.get("method").is_some()
            && (value.get("id").is_none() || value.get("id") == Some(&Value::Null));

        if is_response {
            #[derive(Deserialize)]
            struct Response {
                id: Id,
                result: Option<Value>,
                error: Option<JsonRpcError>,
            }

            let response: Response = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Response {
                id: response.id,
                result: response.result,
                error: response.error,
            })
        } else if is_notification {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| de::Error::missing_field("method"))?
                .to_string();

            let params = value
                .get("params")
                .cloned()
                .ok_or_else(|| de::Error::missing_field("params"))?;

            Ok(Message::Notification { method, params })
        } else if value.get("method").is_some() && value.get("id").is_some() {
            #[derive(Deserialize)]
            struct Request {
                id: Id,
                method: String,
                params: Value,
            }

            let request: Request = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Request {
                id: request.id,
                method: request.method,
                params: request.params,
            })
        } else {
            Err(de::Error::custom("unknown message format"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(s: &str, expected: Message) {
        let actual = serde_json::from_str::<Message>(s).unwrap();
        assert_eq!(actual, expected, "deserialize Message from str");

        let round_trip =
            serde_json::from_str::<Message>(&serde_json::to_string(&actual).unwrap()).unwrap();
        assert_eq!(round_trip, expected, "roundtrip");
    }

    #[test]
    fn request() {
        case(
            r#"{"id":1,"method":"mining.subscribe","params":["stope/0.1.0"]}"#,
            Message::Request {
                id: Id::Number(1),
                method: "mining.subscribe".into(),
                params: json!(["stope/0.1.0"]),
            },
        );
    }

    #[test]
    fn request_with_string_id() {
        case(
            r#"{"id":"a1","method":"mining.authorize","params":[]}"#,
            Message::Request {
                id: Id::String("a1".into()),
                method: "mining.authorize".into(),
                params: json!([]),
            },
        );
    }

    #[test]
    fn notification_with_and_without_null_id() {
        let expected = Message::Notification {
            method: "mining.notify".into(),
            params: json!([]),
        };

        case(r#"{"method":"mining.notify","params":[]}"#, expected.clone());

        assert_eq!(
            serde_json::from_str::<Message>(r#"{"method":"mining.notify","params":[],"id":null}"#)
                .unwrap(),
            expected,
        );
    }

    #[test]
    fn notification_serializes_with_null_id() {
        let notification = Message::Notification {
            method: "mining.set_difficulty".into(),
            params: json!([16384]),
        };

        let value: Value =
            serde_json::from_str(&serde_json::to_string(&notification).unwrap()).unwrap();
        assert_eq!(value.get("id"), Some(&Value::Null));
    }

    #[test]
    fn response() {
        case(
            r#"{"id":4,"result":true,"error":null}"#,
            Message::Response {
                id: Id::Number(4),
                result: Some(json!(true)),
                error: None,
            },
        );
    }

    #[test]
    fn error_response() {
        case(
            r#"{"id":10,"result":null,"error":[21,"Job not found",null]}"#,
            Message::Response {
                id: Id::Number(10),
                result: None,
                error: Some(StratumError::JobNotFound.into_response(None)),
            },
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"nope":1}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn id_display() {
        assert_eq!(Id::Null.to_string(), "null");
        assert_eq!(Id::Number(7).to_string(), "7");
        assert_eq!(Id::String("x".into()).to_string(), "x");
    }
}
