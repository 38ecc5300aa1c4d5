#![allow(dead_code)]

use std::net::TcpListener;

use serde_json::{Value, json};
use wiremock::{Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "TEST-KEY-0000";

/// Reserves a loopback port that is free at the time of the call.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

pub fn account_body() -> Value {
    json!({
        "id": "A1B2C3D4-0000-1111-2222-333344445555",
        "name": "Tester.1234",
        "access": ["GuildWars2", "HeartOfThorns", "PathOfFire"],
        "age": 86400,
        "world": 1001
    })
}

pub fn requested_ids(request: &Request) -> Vec<u64> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "ids")
        .map(|(_, value)| {
            value
                .split(',')
                .filter_map(|id| id.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Answers an achievements lookup with `{id, name: "A<id>"}` for every requested id.
pub struct EchoAchievementNames;

impl Respond for EchoAchievementNames {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Vec<Value> = requested_ids(request)
            .into_iter()
            .map(|id| json!({ "id": id, "name": format!("A{id}") }))
            .collect();
        ResponseTemplate::new(200).set_body_json(body)
    }
}
