/*
Reconocimiento de lengua de signos en tiempo real - Rust + ONNX

Lee resultados de detección (JSON Lines, uno por frame) desde un fichero o
stdin, segmenta los gestos con la máquina neutral/detecting/predicted y
clasifica cada ventana de 20 frames con el modelo secuencial.

Cada línea puede ser un objeto de detección:
    {"pose": [{"x":..,"y":..,"z":..,"visibility":..}, ...], "left_hand": [...], ...}
o un vector de 1662 keypoints ya aplanado.

Para compilar y ejecutar:
    cargo run --release --features onnx -- --model model.onnx --labels label_map.json frames.jsonl
    landmark-extractor | ./target/release/signstream --model model.onnx -

Nivel de log con RUST_LOG (p. ej. RUST_LOG=signstream=debug).
*/

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Sender};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use signstream::classifier::InferenceClient;
use signstream::window_io::save_window_json;
use signstream::{ConfirmedGestureEvent, DetectionResult, GestureSession, PipelineConfig};

/// Frames en vuelo entre el lector y la sesión
const FRAME_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "signstream", about = "Segmentación y reconocimiento de signos en tiempo real")]
struct Args {
    /// Fichero JSON Lines con un frame por línea ("-" para stdin)
    #[arg(default_value = "-")]
    input: String,

    /// Modelo ONNX con entrada [1, seq_len, 1662]
    #[arg(long, value_name = "PATH", default_value = "model.onnx")]
    model: PathBuf,

    /// Mapa de etiquetas ({"index_to_class": {...}} o lista)
    #[arg(long, value_name = "PATH", default_value = "label_map.json")]
    labels: PathBuf,

    /// Configuración del pipeline en JSON (campos ausentes = valores por defecto)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Sobrescribe confidence_threshold
    #[arg(long)]
    confidence: Option<f32>,

    /// Sobrescribe inference_timeout_ms
    #[arg(long)]
    inference_timeout_ms: Option<u64>,

    /// Guarda la ventana de cada gesto confirmado en este directorio
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Emite cada gesto confirmado como una línea JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    Keypoints(Vec<f32>),
    Detection(DetectionResult),
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => PipelineConfig::default(),
    };

    if let Some(confidence) = args.confidence {
        config.confidence_threshold = confidence;
    }
    if let Some(timeout) = args.inference_timeout_ms {
        config.inference_timeout_ms = timeout;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "onnx")]
fn build_classifier(args: &Args, config: &PipelineConfig) -> Result<Box<dyn InferenceClient + Send>> {
    use anyhow::anyhow;
    use signstream::classifier::OnnxClassifier;
    use signstream::inference_worker::InferenceWorker;

    let model = args
        .model
        .to_str()
        .ok_or_else(|| anyhow!("Ruta de modelo no válida: {:?}", args.model))?;
    let labels = args
        .labels
        .to_str()
        .ok_or_else(|| anyhow!("Ruta de etiquetas no válida: {:?}", args.labels))?;

    let classifier = OnnxClassifier::new(model, labels, config.seq_len)
        .with_context(|| format!("No se pudo cargar el modelo {:?}", args.model))?;

    Ok(Box::new(InferenceWorker::spawn(
        classifier,
        config.inference_timeout(),
    )))
}

#[cfg(not(feature = "onnx"))]
fn build_classifier(args: &Args, _config: &PipelineConfig) -> Result<Box<dyn InferenceClient + Send>> {
    anyhow::bail!(
        "Compilado sin la feature `onnx`; no se puede cargar {:?} (usa --features onnx)",
        args.model
    )
}

fn open_input(input: &str) -> Result<Box<dyn BufRead + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("No se pudo abrir {:?}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Lee líneas hasta EOF. Las líneas mal formadas se registran y se saltan.
fn read_frames(reader: Box<dyn BufRead + Send>, tx: Sender<InputLine>) -> Result<()> {
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Error leyendo la línea {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<InputLine>(trimmed) {
            Ok(frame) => {
                if tx.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => warn!(line = idx + 1, error = %e, "Línea inválida, se ignora"),
        }
    }
    Ok(())
}

fn spawn_reader(reader: Box<dyn BufRead + Send>, tx: Sender<InputLine>) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = read_frames(reader, tx) {
            error!(error = %e, "Error en el lector de frames");
        }
    })
}

fn report_event(args: &Args, event: &ConfirmedGestureEvent) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    println!(
        "\n🥇 {} ({:.1}%)  estabilidad {:.0}%  [frame {}]",
        event.label,
        event.confidence * 100.0,
        event.stability * 100.0,
        event.frame_index
    );
    for (idx, (label, score)) in event.top_k.iter().enumerate() {
        println!("  {:>2}. {:<25} {:>6.2}%", idx + 1, label, score * 100.0);
    }
    Ok(())
}

fn dump_window(dir: &Path, session: &GestureSession, event: &ConfirmedGestureEvent) -> Result<()> {
    let path = dir.join(format!(
        "gesture_{:06}_{}.json",
        event.frame_index, event.class_index
    ));
    save_window_json(&path, &session.window().snapshot())?;
    debug!(path = ?path, "Ventana guardada");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let classifier = build_classifier(&args, &config)?;
    info!(
        classes = classifier.labels().len(),
        seq_len = config.seq_len,
        confidence = config.confidence_threshold,
        "Clasificador listo"
    );

    let mut session = GestureSession::new(config, classifier)?;

    let (tx, rx) = bounded::<InputLine>(FRAME_QUEUE);
    let reader = spawn_reader(open_input(&args.input)?, tx);

    let mut confirmed = 0usize;
    let mut rejected = 0usize;
    let mut prompt_shown = false;

    for line in rx.iter() {
        let report = match line {
            InputLine::Detection(detection) => session.process(&detection),
            InputLine::Keypoints(values) => match session.process_keypoints(values) {
                Ok(report) => report,
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "Frame descartado");
                    continue;
                }
            },
        };

        debug!(
            frame = report.frame_index,
            state = %report.state,
            neutral = report.neutral,
            window = report.window_len,
            "{}",
            report.status
        );

        if report.center_prompt && !prompt_shown {
            info!("Colócate en el centro del encuadre");
        }
        prompt_shown = report.center_prompt;

        if let Some(event) = &report.event {
            confirmed += 1;
            report_event(&args, event)?;

            if let Some(dir) = &args.dump_dir {
                if let Err(e) = dump_window(dir, &session, event) {
                    warn!(error = %e, "No se pudo guardar la ventana");
                }
            }
        }
    }

    if reader.join().is_err() {
        warn!("El hilo lector terminó con pánico");
    }

    info!(
        frames = session.frame_index(),
        confirmed, rejected, "Fin de la entrada"
    );
    Ok(())
}
