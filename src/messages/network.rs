//! Network messages - communication between App and Network layers

use crate::models::{Environment, Request, Response};

/// Commands sent from App layer to Network layer
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    /// Send a request; substitution happens in the network task
    ExecuteRequest {
        id: u64,
        request: Request,
        environment: Option<Environment>,
    },
    /// Shutdown the network actor
    Shutdown,
}

/// A finished send, successful or not
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub id: u64,
    /// The request as it was handed to the network layer
    pub request: Request,
    pub response: Response,
}
