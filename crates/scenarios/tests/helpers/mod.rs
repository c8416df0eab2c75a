//! Stand-in services for scenario tests.
//!
//! - [`serve_gateway`]: axum router answering `POST /submit`
//! - [`serve_transport`]: tonic Flight server answering `DoGet`

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow_array::{Int64Array, RecordBatch};
use arrow_flight::encode::FlightDataEncoderBuilder;
use arrow_flight::flight_service_server::{FlightService, FlightServiceServer};
use arrow_flight::{
    Action, ActionType, Criteria, Empty, FlightData, FlightDescriptor, FlightInfo,
    HandshakeRequest, HandshakeResponse, PollInfo, PutResult, SchemaResult, Ticket,
};
use arrow_schema::{DataType, Field, Schema};
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, Streaming};

use qbridge_e2e_core::config::E2eConfig;
use qbridge_e2e_scenarios::SystemEndpoints;

/// Endpoints pointing at the given stand-ins, with short timeouts.
pub fn endpoints(gateway: Option<SocketAddr>, transport: Option<SocketAddr>, buffer_log: &Path) -> SystemEndpoints {
    let mut config = E2eConfig::default();
    if let Some(addr) = gateway {
        config.gateway.base_url = format!("http://{addr}");
    }
    config.gateway.request_timeout_secs = 2;
    if let Some(addr) = transport {
        config.transport.address = format!("grpc://{addr}");
    }
    config.transport.timeout_secs = 2;
    config.buffer.consume_timeout_secs = 1;
    config.buffer.poll_interval_ms = 50;

    let mut endpoints = SystemEndpoints::from_config(&config);
    endpoints.buffer_log = buffer_log.to_path_buf();
    endpoints
}

/// Address that refuses connections.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// What the stand-in gateway answers.
#[derive(Clone)]
pub enum GatewayReply {
    Accepted(serde_json::Value),
    Status(StatusCode, String),
    /// Accept the request but answer only after the delay.
    Stall(std::time::Duration),
}

/// Serve `POST /submit`; the last received body is stored in the returned slot.
pub async fn serve_gateway(reply: GatewayReply) -> (SocketAddr, Arc<Mutex<Option<serde_json::Value>>>) {
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();

    let app = Router::new().route(
        "/submit",
        post(move |Json(body): Json<serde_json::Value>| {
            let slot = slot.clone();
            let reply = reply.clone();
            async move {
                *slot.lock().unwrap() = Some(body);
                match reply {
                    GatewayReply::Accepted(value) => (StatusCode::ACCEPTED, value.to_string()),
                    GatewayReply::Status(status, text) => (status, text),
                    GatewayReply::Stall(delay) => {
                        tokio::time::sleep(delay).await;
                        (StatusCode::ACCEPTED, "{}".to_owned())
                    }
                }
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// What the stand-in transport returns from `DoGet`.
#[derive(Clone, Copy)]
pub enum TransportReply {
    /// No messages at all, like the real placeholder service.
    Empty,
    /// `batches` record batches of `rows` rows each.
    Rows { batches: usize, rows: usize },
    /// `NOT_FOUND` status.
    NotFound,
    /// Headers are sent, the stream never yields.
    Stall,
}

#[derive(Clone)]
struct StandInTransport {
    reply: TransportReply,
    tickets: Arc<Mutex<Vec<Vec<u8>>>>,
}

type FlightStream<T> = BoxStream<'static, Result<T, Status>>;

#[tonic::async_trait]
impl FlightService for StandInTransport {
    type HandshakeStream = FlightStream<HandshakeResponse>;
    type ListFlightsStream = FlightStream<FlightInfo>;
    type DoGetStream = FlightStream<FlightData>;
    type DoPutStream = FlightStream<PutResult>;
    type DoActionStream = FlightStream<arrow_flight::Result>;
    type ListActionsStream = FlightStream<ActionType>;
    type DoExchangeStream = FlightStream<FlightData>;

    async fn do_get(&self, request: Request<Ticket>) -> Result<Response<Self::DoGetStream>, Status> {
        self.tickets.lock().unwrap().push(request.into_inner().ticket.to_vec());

        let stream: Self::DoGetStream = match self.reply {
            TransportReply::Empty => futures::stream::empty().boxed(),
            TransportReply::Rows { batches, rows } => {
                let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
                let batch = RecordBatch::try_new(
                    schema,
                    vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))],
                )
                .map_err(|e| Status::internal(e.to_string()))?;
                let input = futures::stream::iter((0..batches).map(move |_| Ok(batch.clone())));
                FlightDataEncoderBuilder::new()
                    .build(input)
                    .map_err(|e| Status::internal(e.to_string()))
                    .boxed()
            }
            TransportReply::NotFound => return Err(Status::not_found("unknown ticket")),
            TransportReply::Stall => futures::stream::pending().boxed(),
        };
        Ok(Response::new(stream))
    }

    async fn handshake(
        &self,
        _request: Request<Streaming<HandshakeRequest>>,
    ) -> Result<Response<Self::HandshakeStream>, Status> {
        Err(Status::unimplemented("handshake"))
    }

    async fn list_flights(
        &self,
        _request: Request<Criteria>,
    ) -> Result<Response<Self::ListFlightsStream>, Status> {
        Err(Status::unimplemented("list_flights"))
    }

    async fn get_flight_info(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<FlightInfo>, Status> {
        Err(Status::unimplemented("get_flight_info"))
    }

    async fn poll_flight_info(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<PollInfo>, Status> {
        Err(Status::unimplemented("poll_flight_info"))
    }

    async fn get_schema(
        &self,
        _request: Request<FlightDescriptor>,
    ) -> Result<Response<SchemaResult>, Status> {
        Err(Status::unimplemented("get_schema"))
    }

    async fn do_put(
        &self,
        _request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoPutStream>, Status> {
        Err(Status::unimplemented("do_put"))
    }

    async fn do_action(
        &self,
        _request: Request<Action>,
    ) -> Result<Response<Self::DoActionStream>, Status> {
        Err(Status::unimplemented("do_action"))
    }

    async fn list_actions(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Self::ListActionsStream>, Status> {
        Err(Status::unimplemented("list_actions"))
    }

    async fn do_exchange(
        &self,
        _request: Request<Streaming<FlightData>>,
    ) -> Result<Response<Self::DoExchangeStream>, Status> {
        Err(Status::unimplemented("do_exchange"))
    }
}

/// Serve a Flight stand-in; received tickets are stored in the returned list.
pub async fn serve_transport(reply: TransportReply) -> (SocketAddr, Arc<Mutex<Vec<Vec<u8>>>>) {
    let tickets = Arc::new(Mutex::new(Vec::new()));
    let service = StandInTransport {
        reply,
        tickets: tickets.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(FlightServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    (addr, tickets)
}
