//! JSON request/reply protocol.
//!
//! A request is a JSON object whose recognised fields select queries:
//!
//! | field | reply |
//! |---|---|
//! | `check_awake` | `"awake": true` |
//! | `get_ids` | `"ids": [..]` |
//! | `get_robot: <id>` | `"orientation"` and `"neighbours"` of that robot |
//! | `get_robots` | one `"<id>": {"orientation", "neighbours"}` entry per robot |
//!
//! Fields are recognised by presence; their values (except for `get_robot`)
//! are ignored. Unknown fields are skipped, and a request without any
//! recognised field gets no reply. Failures are reported in the reply as
//! `"error": {"kind", "message"}`.

use log::{debug, warn};
use serde_json::{json, Map, Value};
use swarm_arena_core::{Robot, TagId, WorldModel};

pub const CHECK_AWAKE: &str = "check_awake";
pub const GET_IDS: &str = "get_ids";
pub const GET_ROBOT: &str = "get_robot";
pub const GET_ROBOTS: &str = "get_robots";

/// A message that cannot be read as a request at all.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolDecodeError {
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("binary message is not valid UTF-8")]
    NotUtf8,
}

/// A well-formed request that cannot be answered from the snapshot.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("robot {0} is not tracked")]
    NotFound(TagId),
    #[error("invalid robot id {0}")]
    InvalidRobotId(Value),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidRobotId(_) => "invalid_request",
        }
    }
}

/// The recognised query fields of one message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub check_awake: bool,
    pub get_ids: bool,
    /// Raw value of `get_robot`, parsed when answering.
    pub get_robot: Option<Value>,
    pub get_robots: bool,
}

impl Request {
    pub fn decode(text: &str) -> Result<Self, ProtocolDecodeError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self::from_fields(&fields)),
            _ => Err(ProtocolDecodeError::NotAnObject),
        }
    }

    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, ProtocolDecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolDecodeError::NotUtf8)?;
        Self::decode(text)
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            check_awake: fields.contains_key(CHECK_AWAKE),
            get_ids: fields.contains_key(GET_IDS),
            get_robot: fields.get(GET_ROBOT).cloned(),
            get_robots: fields.contains_key(GET_ROBOTS),
        }
    }

    /// `true` if no recognised field was present.
    pub fn is_empty(&self) -> bool {
        !self.check_awake && !self.get_ids && self.get_robot.is_none() && !self.get_robots
    }
}

/// Parse a robot id given as a JSON integer (or integral float) or a string
/// holding one.
pub fn parse_robot_id(value: &Value) -> Result<TagId, QueryError> {
    let raw = match value {
        // JSON has one number type; `7.0` names robot 7 just like `7`.
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    raw.and_then(|raw| TagId::new(raw).ok())
        .ok_or_else(|| QueryError::InvalidRobotId(value.clone()))
}

fn find_robot<'w>(world: &'w WorldModel, value: &Value) -> Result<&'w Robot, QueryError> {
    let id = parse_robot_id(value)?;
    world.robot(id).ok_or(QueryError::NotFound(id))
}

fn neighbours_json(robot: &Robot) -> Value {
    let neighbours: Map<String, Value> = robot
        .neighbours
        .iter()
        .map(|(id, reading)| {
            (
                id.to_string(),
                json!({
                    "range": reading.range_m,
                    "bearing": reading.bearing_deg,
                    "orientation": reading.orientation_deg,
                }),
            )
        })
        .collect();
    Value::Object(neighbours)
}

fn robot_json(robot: &Robot) -> Value {
    json!({
        "orientation": robot.orientation_deg,
        "neighbours": neighbours_json(robot),
    })
}

fn error_field(kind: &str, message: impl std::fmt::Display) -> Value {
    json!({ "kind": kind, "message": message.to_string() })
}

/// Build an `{"error": {..}}` reply.
pub fn error_reply(kind: &str, message: impl std::fmt::Display) -> Value {
    json!({ "error": error_field(kind, message) })
}

/// Answer a decoded request from one snapshot.
///
/// Returns `None` when the request carries no recognised field.
pub fn answer(request: &Request, world: &WorldModel) -> Option<Value> {
    if request.is_empty() {
        return None;
    }

    let mut reply = Map::new();
    if request.check_awake {
        reply.insert("awake".to_owned(), Value::Bool(true));
    }
    if request.get_ids {
        let ids = world.robot_ids().map(|id| Value::from(id.get())).collect();
        reply.insert("ids".to_owned(), Value::Array(ids));
    }
    if let Some(raw) = &request.get_robot {
        match find_robot(world, raw) {
            Ok(robot) => {
                reply.insert("orientation".to_owned(), Value::from(robot.orientation_deg));
                reply.insert("neighbours".to_owned(), neighbours_json(robot));
            }
            Err(err) => {
                debug!("get_robot failed: {err}");
                reply.insert("error".to_owned(), error_field(err.kind(), &err));
            }
        }
    }
    if request.get_robots {
        for robot in world.robots.values() {
            reply.insert(robot.id.to_string(), robot_json(robot));
        }
    }
    Some(Value::Object(reply))
}

fn decode_failure(err: ProtocolDecodeError) -> Option<Value> {
    warn!("undecodable request: {err}");
    Some(error_reply("decode", err))
}

/// Decode a text message and answer it; decode failures become error replies.
pub fn respond(text: &str, world: &WorldModel) -> Option<Value> {
    match Request::decode(text) {
        Ok(request) => answer(&request, world),
        Err(err) => decode_failure(err),
    }
}

/// Same as [`respond`] for a binary frame carrying UTF-8 JSON.
pub fn respond_bytes(bytes: &[u8], world: &WorldModel) -> Option<Value> {
    match Request::decode_bytes(bytes) {
        Ok(request) => answer(&request, world),
        Err(err) => decode_failure(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use swarm_arena_core::{RawDetection, WorldBuilder};

    fn marker(id: i64, cx: f64, cy: f64) -> RawDetection {
        let (l, r, t, b) = (cx - 10.0, cx + 10.0, cy - 10.0, cy + 10.0);
        RawDetection::new(id, [[l, t], [r, t], [r, b], [l, b]])
    }

    /// 500 px per metre; robots 3 and 5 are 0.1 m apart, robot 9 is far away.
    fn sample_world() -> WorldModel {
        let mut builder = WorldBuilder::default();
        builder.process_frame(&[marker(0, 0.0, 0.0), marker(0, 1030.0, 0.0)]);
        builder
            .process_frame(&[
                marker(3, 100.0, 100.0),
                marker(5, 150.0, 100.0),
                marker(9, 900.0, 400.0),
            ])
            .world
    }

    #[test]
    fn missing_robot_yields_error_field() {
        let reply = respond(r#"{"get_robot": 7}"#, &sample_world()).expect("reply");
        assert_eq!(reply["error"]["kind"], "not_found");
        assert!(reply.get("orientation").is_none());
    }

    #[test]
    fn combined_fields_share_one_reply() {
        let reply = respond(r#"{"check_awake": true, "get_ids": true}"#, &sample_world())
            .expect("reply");
        assert_eq!(reply["awake"], true);
        assert_eq!(reply["ids"], json!([3, 5, 9]));
        assert!(reply.get("error").is_none());
    }

    #[test]
    fn unrecognised_fields_get_no_reply() {
        let world = sample_world();
        assert_eq!(respond(r#"{"hello": 1}"#, &world), None);
        assert_eq!(respond("{}", &world), None);
    }

    #[test]
    fn presence_not_value_selects_a_query() {
        let reply = respond(r#"{"check_awake": false}"#, &sample_world()).expect("reply");
        assert_eq!(reply, json!({"awake": true}));
    }

    #[test]
    fn get_robot_reports_neighbours() {
        let world = sample_world();
        let reply = respond(r#"{"get_robot": 3}"#, &world).expect("reply");
        let robot = world.robot(TagId::from(3)).expect("robot 3");

        assert_abs_diff_eq!(
            reply["orientation"].as_f64().expect("orientation"),
            robot.orientation_deg
        );
        let neighbours = reply["neighbours"].as_object().expect("neighbours");
        assert_eq!(neighbours.len(), 1);
        let five = &neighbours["5"];
        assert_abs_diff_eq!(five["range"].as_f64().expect("range"), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(five["bearing"].as_f64().expect("bearing"), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn get_robot_accepts_numeric_string() {
        let world = sample_world();
        let by_int = respond(r#"{"get_robot": 5}"#, &world);
        let by_str = respond(r#"{"get_robot": "5"}"#, &world);
        assert_eq!(by_int, by_str);
    }

    #[test]
    fn get_robot_accepts_integral_float() {
        let world = sample_world();
        let reply = respond(r#"{"get_robot": 5.0}"#, &world).expect("reply");
        assert!(reply.get("error").is_none(), "{reply}");
        assert_eq!(reply, respond(r#"{"get_robot": 5}"#, &world).expect("reply"));

        let reply = respond(r#"{"get_robot": 7.0}"#, &world).expect("reply");
        assert_eq!(reply["error"]["kind"], "not_found");
    }

    #[test]
    fn get_robot_error_matches_error_reply_shape() {
        let reply = respond(r#"{"get_robot": 7}"#, &sample_world()).expect("reply");
        let message = QueryError::NotFound(TagId::from(7)).to_string();
        assert_eq!(reply, error_reply("not_found", message));
    }

    #[test]
    fn get_robot_rejects_non_ids() {
        let world = sample_world();
        for text in [
            r#"{"get_robot": -1}"#,
            r#"{"get_robot": 2.5}"#,
            r#"{"get_robot": "five"}"#,
            r#"{"get_robot": null}"#,
        ] {
            let reply = respond(text, &world).expect("reply");
            assert_eq!(reply["error"]["kind"], "invalid_request", "{text}");
        }
    }

    #[test]
    fn get_robots_keys_every_robot() {
        let world = sample_world();
        let reply = respond(r#"{"get_robots": true}"#, &world).expect("reply");
        let fields = reply.as_object().expect("object");
        assert_eq!(fields.len(), 3);
        assert!(fields["9"]["neighbours"].as_object().expect("map").is_empty());
        assert!(fields["5"]["neighbours"].get("3").is_some());
    }

    #[test]
    fn uncalibrated_world_is_empty_not_an_error() {
        let reply = respond(r#"{"get_ids": 1, "get_robots": 1}"#, &WorldModel::default())
            .expect("reply");
        assert_eq!(reply, json!({"ids": []}));
    }

    #[test]
    fn undecodable_messages_are_reported() {
        let world = sample_world();
        for text in ["not json", "[1, 2]", "42"] {
            let reply = respond(text, &world).expect("reply");
            assert_eq!(reply["error"]["kind"], "decode", "{text}");
        }
        let reply = respond_bytes(&[0xff, 0xfe], &world).expect("reply");
        assert_eq!(reply["error"]["kind"], "decode");
        assert!(respond_bytes(br#"{"check_awake": 1}"#, &world).is_some());
    }
}
