use crate::{RoomApi, SessionConfig, SignalTransport, TransportError};
use async_trait::async_trait;
use huddle_core::{IceServerConfig, Participant, RoomId, RoomSummary, SignalPayload};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Serialize)]
struct SignalBody<'a> {
    payload: &'a SignalPayload,
}

#[derive(Deserialize)]
struct RoomBody {
    room: RoomSummary,
}

#[derive(Deserialize)]
struct ParticipantsBody {
    participants: Vec<Participant>,
}

#[derive(Deserialize)]
struct IceServersBody {
    ice_servers: Vec<IceServerConfig>,
}

/// Server API over HTTP, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.base_url.clone(), config.token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<Value>().await {
            Ok(body) => body["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => status.to_string(),
        };
        Err(TransportError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn network(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait(?Send)]
impl SignalTransport for HttpTransport {
    async fn send(&self, room_id: RoomId, payload: SignalPayload) -> Result<(), TransportError> {
        debug!(
            "Posting {} signal event(s) to room {}",
            payload.event_count(),
            room_id
        );
        let response = self
            .client
            .post(self.url(&format!("/rooms/{}/signal", room_id)))
            .bearer_auth(&self.token)
            .json(&SignalBody { payload: &payload })
            .send()
            .await
            .map_err(network)?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl RoomApi for HttpTransport {
    async fn join(&self, room: &str) -> Result<RoomSummary, TransportError> {
        let response = self
            .client
            .post(self.url(&format!("/rooms/{}/join", room)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network)?;
        let body: RoomBody = Self::check(response).await?.json().await.map_err(network)?;
        Ok(body.room)
    }

    async fn leave(&self, room_id: RoomId) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.url(&format!("/rooms/{}/leave", room_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn participants(&self, room_id: RoomId) -> Result<Vec<Participant>, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("/rooms/{}/participants", room_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network)?;
        let body: ParticipantsBody = Self::check(response).await?.json().await.map_err(network)?;
        Ok(body.participants)
    }

    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>, TransportError> {
        let response = self
            .client
            .get(self.url("/ice-servers"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(network)?;
        let body: IceServersBody = Self::check(response).await?.json().await.map_err(network)?;
        Ok(body.ice_servers)
    }
}
