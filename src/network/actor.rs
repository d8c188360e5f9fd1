//! Network actor - runs HTTP requests in the Tokio async runtime

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::messages::{NetworkCommand, NetworkResponse};
use crate::network::client::{create_client, execute_request};

/// Network actor that processes send commands
///
/// Every send runs in its own task; sends are never coalesced or cancelled.
pub struct NetworkActor {
    client: reqwest::Client,
    response_tx: mpsc::UnboundedSender<NetworkResponse>,
    active_requests: JoinSet<()>,
}

impl NetworkActor {
    pub fn new(
        response_tx: mpsc::UnboundedSender<NetworkResponse>,
        timeout: Option<Duration>,
    ) -> Self {
        NetworkActor {
            client: create_client(timeout),
            response_tx,
            active_requests: JoinSet::new(),
        }
    }

    /// Run the network actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<NetworkCommand>) {
        loop {
            tokio::select! {
                biased;

                // Handle incoming commands
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NetworkCommand::ExecuteRequest { id, request, environment }) => {
                            let response_tx = self.response_tx.clone();
                            let client = self.client.clone();

                            self.active_requests.spawn(async move {
                                tracing::info!(id, url = %request.url, method = request.method.as_str(), "Executing request");
                                let response = execute_request(&client, &request, environment.as_ref()).await;
                                tracing::info!(id, status = response.status, time_ms = response.time, "Request completed");
                                let _ = response_tx.send(NetworkResponse { id, request, response });
                            });
                        }

                        Some(NetworkCommand::Shutdown) | None => break,
                    }
                }

                // Clean up completed tasks
                Some(result) = self.active_requests.join_next() => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Request task failed");
                    }
                }
            }
        }

        self.active_requests.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Request;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_concurrent_sends_all_complete() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock)
            .await;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(NetworkActor::new(resp_tx, None).run(cmd_rx));

        for id in 1..=3 {
            let request = Request {
                url: format!("{}/item/{}", mock.uri(), id),
                ..Request::default()
            };
            cmd_tx
                .send(NetworkCommand::ExecuteRequest { id, request, environment: None })
                .unwrap();
        }

        let mut ids = Vec::new();
        for _ in 0..3 {
            let done = resp_rx.recv().await.unwrap();
            assert_eq!(done.response.status, 200);
            ids.push(done.id);
        }
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        cmd_tx.send(NetworkCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
