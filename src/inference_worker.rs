//! Inferencia en un hilo dedicado.
//!
//! La cola de peticiones tiene capacidad 1 y la última gana: si llega una
//! ventana nueva mientras otra espera, la antigua se descarta. Cada llamada a
//! `classify` espera como mucho `timeout`; al expirar se trata como un fallo
//! del clasificador. Las respuestas de peticiones antiguas se ignoran.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::classifier::{ClassifierError, InferenceClient};
use crate::types::KeypointFrame;

struct Request {
    id: u64,
    window: Vec<KeypointFrame>,
}

struct Response {
    id: u64,
    result: Result<Vec<f32>, ClassifierError>,
}

pub struct InferenceWorker {
    request_tx: Sender<Request>,
    /// Extremo de lectura compartido con el hilo, para retirar peticiones obsoletas
    request_rx: Receiver<Request>,
    response_rx: Receiver<Response>,
    labels: Vec<String>,
    timeout: Duration,
    next_id: u64,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Lanza el hilo de inferencia, que pasa a ser dueño del clasificador
    pub fn spawn<C>(mut client: C, timeout: Duration) -> Self
    where
        C: InferenceClient + Send + 'static,
    {
        let labels = client.labels().to_vec();
        let (request_tx, request_rx) = bounded::<Request>(1);
        let (response_tx, response_rx) = unbounded::<Response>();

        let worker_rx = request_rx.clone();
        let handle = thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                for request in worker_rx.iter() {
                    let started = Instant::now();
                    let result = client.classify(&request.window);
                    debug!(
                        id = request.id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Inferencia terminada"
                    );

                    if response_tx
                        .send(Response {
                            id: request.id,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                debug!("Hilo de inferencia finalizado");
            })
            .map_err(|e| warn!(error = %e, "No se pudo lanzar el hilo de inferencia"))
            .ok();

        Self {
            request_tx,
            request_rx,
            response_rx,
            labels,
            timeout,
            next_id: 0,
            handle,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Encola una ventana sin bloquear. Si ya había una esperando, se descarta.
    pub fn submit(&mut self, window: Vec<KeypointFrame>) -> Result<u64, ClassifierError> {
        if self.handle.is_none() {
            return Err(ClassifierError::WorkerDisconnected);
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut request = Request { id, window };
        loop {
            match self.request_tx.try_send(request) {
                Ok(()) => return Ok(id),
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(stale) = self.request_rx.try_recv() {
                        debug!(stale_id = stale.id, "Descartando petición obsoleta");
                    }
                    request = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(ClassifierError::WorkerDisconnected)
                }
            }
        }
    }

    /// Espera la respuesta de `id` hasta `timeout`
    pub fn wait(&self, id: u64, timeout: Duration) -> Result<Vec<f32>, ClassifierError> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) if response.id == id => return response.result,
                Ok(response) => {
                    debug!(stale_id = response.id, "Ignorando respuesta obsoleta");
                }
                Err(RecvTimeoutError::Timeout) => return Err(ClassifierError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ClassifierError::WorkerDisconnected)
                }
            }
        }
    }

    /// Cierra la cola y espera a que el hilo termine la inferencia en curso
    pub fn shutdown(self) {
        let Self {
            request_tx,
            request_rx,
            handle,
            ..
        } = self;
        drop(request_tx);
        drop(request_rx);

        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("El hilo de inferencia terminó con pánico");
            }
        }
    }
}

impl InferenceClient for InferenceWorker {
    fn classify(&mut self, window: &[KeypointFrame]) -> Result<Vec<f32>, ClassifierError> {
        let id = self.submit(window.to_vec())?;
        self.wait(id, self.timeout)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}
