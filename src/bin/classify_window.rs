use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::warn;

use signstream::classifier::{argmax, label_for, top_k, validate_output, InferenceClient};
use signstream::frame_window::{window_stats, LOW_VARIANCE_STD};
use signstream::types::{KeypointFrame, SEQ_LEN};
use signstream::window_io::load_window_json;

/// Clasifica una ventana guardada ({"keypoints": [[1662 floats] x 20]})
#[derive(Parser, Debug)]
#[command(name = "classify_window")]
struct Args {
    /// Ventana en JSON (p. ej. la volcada con --dump-dir)
    window: PathBuf,

    #[arg(long, value_name = "PATH", default_value = "model.onnx")]
    model: PathBuf,

    #[arg(long, value_name = "PATH", default_value = "label_map.json")]
    labels: PathBuf,

    #[arg(long, default_value_t = SEQ_LEN)]
    seq_len: usize,

    #[arg(long, default_value_t = 5)]
    top_k: usize,
}

#[cfg(feature = "onnx")]
fn build_classifier(args: &Args) -> Result<Box<dyn InferenceClient>> {
    use anyhow::Context;
    use signstream::classifier::OnnxClassifier;

    let model = args
        .model
        .to_str()
        .ok_or_else(|| anyhow!("Ruta de modelo no válida: {:?}", args.model))?;
    let labels = args
        .labels
        .to_str()
        .ok_or_else(|| anyhow!("Ruta de etiquetas no válida: {:?}", args.labels))?;

    let classifier = OnnxClassifier::new(model, labels, args.seq_len)
        .with_context(|| format!("No se pudo cargar el modelo {:?}", args.model))?;
    Ok(Box::new(classifier))
}

#[cfg(not(feature = "onnx"))]
fn build_classifier(args: &Args) -> Result<Box<dyn InferenceClient>> {
    anyhow::bail!(
        "Compilado sin la feature `onnx`; no se puede cargar {:?} (usa --features onnx)",
        args.model
    )
}

fn print_stats(window: &[KeypointFrame]) {
    let Some(stats) = window_stats(window.iter()) else {
        return;
    };

    println!("📊 Estadísticas de la ventana ({} frames):", window.len());
    println!("  min  {:>10.6}", stats.min);
    println!("  max  {:>10.6}", stats.max);
    println!("  mean {:>10.6}", stats.mean);
    println!("  std  {:>10.6}", stats.std);

    let static_frames = window.iter().filter(|f| f.is_zero()).count();
    if static_frames > 0 {
        println!("  ⚠️  {} frames sin ninguna detección", static_frames);
    }
    if stats.std < LOW_VARIANCE_STD {
        warn!(std = stats.std, "Varianza muy baja: los keypoints pueden estar congelados");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    println!("🎞️  Clasificando ventana {:?}", args.window);

    let window = load_window_json(&args.window, args.seq_len)?;
    print_stats(&window);

    let mut classifier = build_classifier(&args)?;
    let probabilities = classifier.classify(&window)?;
    validate_output(&probabilities, classifier.labels())?;

    let best = argmax(&probabilities).ok_or_else(|| anyhow!("El modelo no devolvió probabilidades"))?;
    println!(
        "\n🥇 {} ({:.1}%)",
        label_for(classifier.labels(), best.class_index),
        best.confidence * 100.0
    );

    println!("\nTop-{} probabilidades:", args.top_k);
    for (idx, (label, score)) in top_k(&probabilities, classifier.labels(), args.top_k)
        .iter()
        .enumerate()
    {
        println!("  {:>2}. {:<25} {:>6.2}%", idx + 1, label, score * 100.0);
    }

    Ok(())
}
