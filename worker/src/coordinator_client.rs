use common::{
    CoordinatorError, DoneResponse, Epoch, ErrorBody, TaskAssignment, TaskAssignmentRequest,
    TaskCompleteRequest, TaskCompleteResponse, WorkerId,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    /// El coordinador respondió con un error del protocolo.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// No se pudo hablar con el coordinador.
    #[error("error de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("respuesta inesperada {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

/// Cliente HTTP de GetTask / DoneTask / Done.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_task(&self, worker_id: &WorkerId) -> Result<TaskAssignment, ClientError> {
        let res = self
            .http
            .post(format!("{}/api/v1/tasks/next", self.base_url))
            .json(&TaskAssignmentRequest {
                worker_id: Some(worker_id.clone()),
            })
            .send()
            .await?;
        decode(res).await
    }

    pub async fn done_task(
        &self,
        task_id: &str,
        epoch: Epoch,
        worker_id: &WorkerId,
    ) -> Result<(), ClientError> {
        let res = self
            .http
            .post(format!("{}/api/v1/tasks/complete", self.base_url))
            .json(&TaskCompleteRequest {
                task_id: task_id.to_string(),
                epoch,
                worker_id: Some(worker_id.clone()),
            })
            .send()
            .await?;
        let _: TaskCompleteResponse = decode(res).await?;
        Ok(())
    }

    pub async fn is_done(&self) -> Result<bool, ClientError> {
        let res = self
            .http
            .get(format!("{}/api/v1/done", self.base_url))
            .send()
            .await?;
        let DoneResponse { done } = decode(res).await?;
        Ok(done)
    }
}

// 2xx -> T, error con cuerpo ErrorBody -> CoordinatorError, resto -> UnexpectedStatus
async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }

    let body = res.text().await?;
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => Err(ClientError::Coordinator(err.into())),
        Err(_) => Err(ClientError::UnexpectedStatus { status, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCoordinator;

    #[tokio::test]
    async fn empty_queue_decodes_to_no_task_available() {
        let stub = StubCoordinator::start(Vec::new()).await;
        let client = CoordinatorClient::new(stub.url()).unwrap();

        let err = client.get_task(&"w".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Coordinator(CoordinatorError::NoTaskAvailable)
        ));
        assert!(client.is_done().await.unwrap());
    }

    #[tokio::test]
    async fn rejected_report_keeps_task_and_epoch() {
        let stub = StubCoordinator::start(Vec::new()).await;
        let client = CoordinatorClient::new(format!("{}/", stub.url())).unwrap();

        match client.done_task("mr-3", 0, &"w".to_string()).await {
            Err(ClientError::Coordinator(CoordinatorError::NoSuchTask { task_id, epoch })) => {
                assert_eq!(task_id, "mr-3");
                assert_eq!(epoch, 0);
            }
            other => panic!("esperaba NoSuchTask, vino {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_protocol_error_is_unexpected_status() {
        let stub = StubCoordinator::start(Vec::new()).await;
        let client = CoordinatorClient::new(format!("{}/otra-cosa", stub.url())).unwrap();

        let err = client.is_done().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: StatusCode::NOT_FOUND, .. }
        ));
    }

    #[tokio::test]
    async fn closed_port_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CoordinatorClient::new(format!("http://{}", addr)).unwrap();
        let err = client.is_done().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
