use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

use transformer_from_scratch::models::transformer::{
    causal_mask, EncoderDecoder, TransformerConfig, FLOATING_DTYPE,
};

/// Helper: compute summary stats (mean, min, max) from a tensor for logging.
fn tensor_stats(t: &Tensor) -> (f32, f32, f32) {
    let flat = t.flatten_all().and_then(|f| f.to_dtype(DType::F32));
    let Ok(flat) = flat else { return (0.0, 0.0, 0.0) };
    let vals: Vec<f32> = flat.to_vec1().unwrap_or_default();
    if vals.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let sum: f32 = vals.iter().sum();
    let mean = sum / vals.len() as f32;
    let min = vals.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = vals.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    (mean, min, max)
}

const CONFIG_JSON: &str = r#"{
    "d_model": 64,
    "num_heads": 8,
    "num_layers": 2,
    "d_ff": 256,
    "vocab_size": 1000,
    "dropout": 0.1,
    "norm_eps": 1e-6,
    "final_norm": false
}"#;

fn main() -> Result<()> {
    let device = Device::Cpu;
    let config: TransformerConfig = serde_json::from_str(CONFIG_JSON)?;
    println!("Config: {config:?}");

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, FLOATING_DTYPE, &device);
    let model = EncoderDecoder::load(vb, &config)?;
    println!("Model built with randomly initialized parameters");

    // Stand-in for the upstream embedding stage: random source/target features
    let (batch, src_len, tgt_len) = (1, 10, 7);
    let src = Tensor::randn(0f32, 1f32, (batch, src_len, config.d_model), &device)?;
    let tgt = Tensor::randn(0f32, 1f32, (batch, tgt_len, config.d_model), &device)?;
    let tgt_mask = causal_mask(tgt_len, &device)?;

    let memory = model.encode(&src, None, false)?;
    let (m_mean, m_min, m_max) = tensor_stats(&memory);
    println!(
        "[Encoder] output: {:?}, stats: mean={:.4}, min={:.4}, max={:.4}",
        memory.dims(),
        m_mean,
        m_min,
        m_max
    );

    let hidden = model.decode(&memory, &tgt, None, Some(&tgt_mask), false)?;
    let (h_mean, h_min, h_max) = tensor_stats(&hidden);
    println!(
        "[Decoder] output: {:?}, stats: mean={:.4}, min={:.4}, max={:.4}",
        hidden.dims(),
        h_mean,
        h_min,
        h_max
    );

    let log_probs = model.generator().forward(&hidden)?;
    let (l_mean, l_min, l_max) = tensor_stats(&log_probs);
    println!(
        "[Generator] log-probs: {:?}, stats: mean={:.4}, min={:.4}, max={:.4}",
        log_probs.dims(),
        l_mean,
        l_min,
        l_max
    );

    Ok(())
}
