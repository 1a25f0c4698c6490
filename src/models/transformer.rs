use candle_core::{D, DType, Device, Result, Tensor};
use candle_nn::{Dropout, Linear, Module, VarBuilder};
use serde::Deserialize;

pub const FLOATING_DTYPE: DType = DType::F32;

/// Additive fill for blocked attention scores. Must be strongly negative so
/// softmax drives blocked positions to ~0 probability; a small or positive
/// fill would leave them visible.
const MASK_FILL: f32 = -1e9;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerConfig {
    pub d_model: usize,
    pub num_heads: usize,
    pub num_layers: usize,
    pub d_ff: usize,
    pub vocab_size: usize,
    pub dropout: f32,
    pub norm_eps: f64,
    /// Apply a trailing LayerNorm after the last layer of each stack.
    pub final_norm: bool,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            d_model: 512,
            num_heads: 8,
            num_layers: 6,
            d_ff: 2048,
            vocab_size: 32000,
            dropout: 0.1,
            norm_eps: 1e-6,
            final_norm: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Masks
// ---------------------------------------------------------------------------

/// Lower-triangular causal mask of shape [1, n, n]: entry (i, j) is 1 iff
/// j <= i, so position i may only attend to positions at or before i.
/// Pure function of `n`; safe to cache per length.
pub fn causal_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    let mut data = vec![0u8; seq_len * seq_len];
    for i in 0..seq_len {
        for j in 0..=i {
            data[i * seq_len + j] = 1;
        }
    }
    Tensor::from_vec(data, (seq_len, seq_len), device)?.unsqueeze(0)
}

/// Padding mask of shape [batch, 1, seq]: 1 where the token is not padding.
/// Broadcasts over the query axis so every query ignores padded keys.
pub fn padding_mask(token_ids: &Tensor, pad_id: u32) -> Result<Tensor> {
    token_ids.ne(pad_id)?.unsqueeze(1)
}

fn masked_fill(scores: &Tensor, mask: &Tensor, value: f32) -> Result<Tensor> {
    let mask = mask.broadcast_as(scores.shape())?;
    let fill = Tensor::new(value, scores.device())?
        .to_dtype(scores.dtype())?
        .broadcast_as(scores.shape())?;
    // mask entries equal to 0 are blocked from attention
    mask.where_cond(scores, &fill)
}

// ---------------------------------------------------------------------------
// Scaled dot-product attention
// ---------------------------------------------------------------------------

/// softmax(Q @ K^T / sqrt(d_k)) @ V over the last two axes.
///
/// Q: [..., seq_q, d_k], K: [..., seq_k, d_k], V: [..., seq_k, d_v],
/// mask (optional): broadcastable to [..., seq_q, seq_k], 0 = blocked.
///
/// Returns (output [..., seq_q, d_v], weights [..., seq_q, seq_k]). The
/// returned weights are the post-softmax distribution before dropout; dropout
/// only affects what multiplies V.
pub fn scaled_dot_product_attention(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    mask: Option<&Tensor>,
    dropout: Option<&Dropout>,
    train: bool,
) -> Result<(Tensor, Tensor)> {
    let d_k = q.dim(D::Minus1)?;
    let scale = 1.0 / (d_k as f64).sqrt();

    let k_t = k.transpose(D::Minus2, D::Minus1)?.contiguous()?;
    let scores = (q.contiguous()?.matmul(&k_t)? * scale)?;
    let scores = match mask {
        Some(mask) => masked_fill(&scores, mask, MASK_FILL)?,
        None => scores,
    };

    let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
    let attended = match dropout {
        Some(dropout) => dropout.forward(&weights, train)?,
        None => weights.clone(),
    };

    let output = attended.matmul(&v.contiguous()?)?;
    Ok((output, weights))
}

// ---------------------------------------------------------------------------
// Multi-head attention
// ---------------------------------------------------------------------------

pub struct MultiHeadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    o_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    dropout: Dropout,
}

impl MultiHeadAttention {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let d = config.d_model;
        let h = config.num_heads;
        if h == 0 || d % h != 0 {
            candle_core::bail!(
                "d_model ({d}) must be divisible by num_heads ({h})"
            );
        }

        let q_proj = candle_nn::linear(d, d, vb.pp("q_proj"))?;
        let k_proj = candle_nn::linear(d, d, vb.pp("k_proj"))?;
        let v_proj = candle_nn::linear(d, d, vb.pp("v_proj"))?;
        let o_proj = candle_nn::linear(d, d, vb.pp("o_proj"))?;

        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            num_heads: h,
            head_dim: d / h,
            dropout: Dropout::new(config.dropout),
        })
    }

    /// Q/K/V: [batch, seq, d_model]; mask (optional): [batch or 1, seq_q, seq_k].
    ///
    /// Returns the attended output [batch, seq_q, d_model] together with the
    /// per-head attention weights [batch, heads, seq_q, seq_k] for inspection.
    pub fn forward(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        mask: Option<&Tensor>,
        train: bool,
    ) -> Result<(Tensor, Tensor)> {
        let (b, seq_q, _) = q.dims3()?;
        let seq_k = k.dim(1)?;

        // Project, then split d_model into heads: [b, s, d] -> [b, h, s, hd]
        let q = self
            .q_proj
            .forward(q)?
            .reshape((b, seq_q, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let k = self
            .k_proj
            .forward(k)?
            .reshape((b, seq_k, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let v = self
            .v_proj
            .forward(v)?
            .reshape((b, seq_k, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;

        // Same mask for every head: [b, sq, sk] -> [b, 1, sq, sk]
        let mask = match mask {
            Some(mask) => Some(mask.unsqueeze(1)?),
            None => None,
        };

        let (attended, weights) = scaled_dot_product_attention(
            &q,
            &k,
            &v,
            mask.as_ref(),
            Some(&self.dropout),
            train,
        )?;

        // Concatenate heads back onto the feature axis
        let attended = attended
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, seq_q, self.num_heads * self.head_dim))?;

        let output = self.o_proj.forward(&attended)?;
        Ok((output, weights))
    }
}

// ---------------------------------------------------------------------------
// Position-wise feed-forward: w2(dropout(relu(w1(x))))
// ---------------------------------------------------------------------------

pub struct FeedForward {
    w1: Linear,
    w2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let w1 = candle_nn::linear(config.d_model, config.d_ff, vb.pp("w1"))?;
        let w2 = candle_nn::linear(config.d_ff, config.d_model, vb.pp("w2"))?;
        Ok(Self {
            w1,
            w2,
            dropout: Dropout::new(config.dropout),
        })
    }

    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let hidden = self.w1.forward(xs)?.relu()?;
        self.w2.forward(&self.dropout.forward(&hidden, train)?)
    }
}

// ---------------------------------------------------------------------------
// LayerNorm (manual, to keep the (sigma + eps) denominator exact)
// ---------------------------------------------------------------------------

pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn load(size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(size, "weight", candle_nn::Init::Const(1.0))?;
        let bias = vb.get_with_hints(size, "bias", candle_nn::Init::Const(0.0))?;
        Ok(Self { weight, bias, eps })
    }

    /// gamma * (x - mean) / (std + eps) + beta over the last axis.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let x_dtype = xs.dtype();
        let internal_dtype = match x_dtype {
            DType::F16 | DType::BF16 => DType::F32,
            d => d,
        };
        let xs = xs.to_dtype(internal_dtype)?;
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let std = centered.sqr()?.mean_keepdim(D::Minus1)?.sqrt()?;
        let normed = centered.broadcast_div(&(std + self.eps)?)?;
        normed
            .to_dtype(x_dtype)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}

// ---------------------------------------------------------------------------
// Sublayer: x + dropout(f(norm(x))) — pre-normalization residual wrapper
// ---------------------------------------------------------------------------

pub struct SublayerConnection {
    norm: LayerNorm,
    dropout: Dropout,
}

impl SublayerConnection {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let norm = LayerNorm::load(config.d_model, config.norm_eps, vb.pp("norm"))?;
        Ok(Self {
            norm,
            dropout: Dropout::new(config.dropout),
        })
    }

    pub fn forward<F>(&self, xs: &Tensor, train: bool, sublayer: F) -> Result<Tensor>
    where
        F: FnOnce(&Tensor) -> Result<Tensor>,
    {
        let out = sublayer(&self.norm.forward(xs)?)?;
        xs + self.dropout.forward(&out, train)?
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub struct EncoderLayer {
    self_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    attn_sublayer: SublayerConnection,
    ff_sublayer: SublayerConnection,
}

impl EncoderLayer {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::load(vb.pp("self_attn"), config)?,
            feed_forward: FeedForward::load(vb.pp("feed_forward"), config)?,
            attn_sublayer: SublayerConnection::load(vb.pp("sublayer.0"), config)?,
            ff_sublayer: SublayerConnection::load(vb.pp("sublayer.1"), config)?,
        })
    }

    pub fn forward(&self, xs: &Tensor, mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let xs = self.attn_sublayer.forward(xs, train, |x| {
            Ok(self.self_attn.forward(x, x, x, mask, train)?.0)
        })?;
        self.ff_sublayer
            .forward(&xs, train, |x| self.feed_forward.forward(x, train))
    }
}

pub struct Encoder {
    layers: Vec<EncoderLayer>,
    norm: Option<LayerNorm>,
}

impl Encoder {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            layers.push(EncoderLayer::load(vb.pp(format!("layers.{i}")), config)?);
        }
        let norm = if config.final_norm {
            Some(LayerNorm::load(config.d_model, config.norm_eps, vb.pp("norm"))?)
        } else {
            None
        };
        Ok(Self { layers, norm })
    }

    pub fn forward(&self, xs: &Tensor, mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = layer.forward(&xs, mask, train)?;
        }
        match &self.norm {
            Some(norm) => norm.forward(&xs),
            None => Ok(xs),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

pub struct DecoderLayer {
    self_attn: MultiHeadAttention,
    cross_attn: MultiHeadAttention,
    feed_forward: FeedForward,
    self_sublayer: SublayerConnection,
    cross_sublayer: SublayerConnection,
    ff_sublayer: SublayerConnection,
}

impl DecoderLayer {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::load(vb.pp("self_attn"), config)?,
            cross_attn: MultiHeadAttention::load(vb.pp("cross_attn"), config)?,
            feed_forward: FeedForward::load(vb.pp("feed_forward"), config)?,
            self_sublayer: SublayerConnection::load(vb.pp("sublayer.0"), config)?,
            cross_sublayer: SublayerConnection::load(vb.pp("sublayer.1"), config)?,
            ff_sublayer: SublayerConnection::load(vb.pp("sublayer.2"), config)?,
        })
    }

    /// `memory` is the encoder output z; `tgt_mask` is the causal mask,
    /// `src_mask` excludes padded source positions from cross-attention.
    pub fn forward(
        &self,
        xs: &Tensor,
        memory: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let xs = self.self_sublayer.forward(xs, train, |x| {
            Ok(self.self_attn.forward(x, x, x, tgt_mask, train)?.0)
        })?;
        let xs = self.cross_sublayer.forward(&xs, train, |x| {
            Ok(self.cross_attn.forward(x, memory, memory, src_mask, train)?.0)
        })?;
        self.ff_sublayer
            .forward(&xs, train, |x| self.feed_forward.forward(x, train))
    }
}

pub struct Decoder {
    layers: Vec<DecoderLayer>,
    norm: Option<LayerNorm>,
}

impl Decoder {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let mut layers = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            layers.push(DecoderLayer::load(vb.pp(format!("layers.{i}")), config)?);
        }
        let norm = if config.final_norm {
            Some(LayerNorm::load(config.d_model, config.norm_eps, vb.pp("norm"))?)
        } else {
            None
        };
        Ok(Self { layers, norm })
    }

    pub fn forward(
        &self,
        xs: &Tensor,
        memory: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = layer.forward(&xs, memory, src_mask, tgt_mask, train)?;
        }
        match &self.norm {
            Some(norm) => norm.forward(&xs),
            None => Ok(xs),
        }
    }
}

// ---------------------------------------------------------------------------
// Generator (linear + log-softmax over the vocabulary)
// ---------------------------------------------------------------------------

pub struct Generator {
    proj: Linear,
}

impl Generator {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        let proj = candle_nn::linear(config.d_model, config.vocab_size, vb.pp("proj"))?;
        Ok(Self { proj })
    }

    /// [batch, seq, d_model] -> per-position log-probabilities
    /// [batch, seq, vocab_size].
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        candle_nn::ops::log_softmax(&self.proj.forward(xs)?, D::Minus1)
    }
}

// ---------------------------------------------------------------------------
// EncoderDecoder (full architecture)
// ---------------------------------------------------------------------------

pub struct EncoderDecoder {
    encoder: Encoder,
    decoder: Decoder,
    generator: Generator,
}

impl EncoderDecoder {
    pub fn load(vb: VarBuilder, config: &TransformerConfig) -> Result<Self> {
        Ok(Self {
            encoder: Encoder::load(vb.pp("encoder"), config)?,
            decoder: Decoder::load(vb.pp("decoder"), config)?,
            generator: Generator::load(vb.pp("generator"), config)?,
        })
    }

    /// Source features [batch, src_seq, d_model] -> context z.
    pub fn encode(&self, src: &Tensor, src_mask: Option<&Tensor>, train: bool) -> Result<Tensor> {
        self.encoder.forward(src, src_mask, train)
    }

    /// Target features + context z -> decoder hidden states.
    pub fn decode(
        &self,
        memory: &Tensor,
        tgt: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        self.decoder.forward(tgt, memory, src_mask, tgt_mask, train)
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Full pass: encode the source, decode the target against it, and map
    /// the result to per-token log-probabilities.
    pub fn forward(
        &self,
        src: &Tensor,
        tgt: &Tensor,
        src_mask: Option<&Tensor>,
        tgt_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let memory = self.encode(src, src_mask, train)?;
        let hidden = self.decode(&memory, tgt, src_mask, tgt_mask, train)?;
        self.generator.forward(&hidden)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::IndexOp;
    use candle_nn::VarMap;

    fn test_config() -> TransformerConfig {
        TransformerConfig {
            d_model: 16,
            num_heads: 4,
            num_layers: 2,
            d_ff: 32,
            vocab_size: 11,
            dropout: 0.0,
            norm_eps: 1e-6,
            final_norm: false,
        }
    }

    fn test_vb(varmap: &VarMap) -> VarBuilder<'_> {
        VarBuilder::from_varmap(varmap, FLOATING_DTYPE, &Device::Cpu)
    }

    #[test]
    fn causal_mask_is_lower_triangular() -> Result<()> {
        let mask = causal_mask(4, &Device::Cpu)?;
        assert_eq!(mask.dims(), &[1, 4, 4]);
        let rows = mask.i(0)?.to_vec2::<u8>()?;
        let expected = [
            [1, 0, 0, 0],
            [1, 1, 0, 0],
            [1, 1, 1, 0],
            [1, 1, 1, 1],
        ];
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.as_slice(), &expected[i]);
        }
        Ok(())
    }

    #[test]
    fn padding_mask_excludes_pad_tokens() -> Result<()> {
        let ids = Tensor::new(&[[5u32, 7, 0, 0]], &Device::Cpu)?;
        let mask = padding_mask(&ids, 0)?;
        assert_eq!(mask.dims(), &[1, 1, 4]);
        assert_eq!(mask.i((0, 0))?.to_vec1::<u8>()?, vec![1, 1, 0, 0]);
        Ok(())
    }

    #[test]
    fn attention_weights_are_normalized_and_masked() -> Result<()> {
        let q = Tensor::randn(0f32, 1f32, (1, 1, 4, 8), &Device::Cpu)?;
        let k = Tensor::randn(0f32, 1f32, (1, 1, 4, 8), &Device::Cpu)?;
        let v = Tensor::randn(0f32, 1f32, (1, 1, 4, 8), &Device::Cpu)?;
        let mask = causal_mask(4, &Device::Cpu)?.unsqueeze(0)?;

        let (out, weights) =
            scaled_dot_product_attention(&q, &k, &v, Some(&mask), None, false)?;
        assert_eq!(out.dims(), &[1, 1, 4, 8]);
        assert_eq!(weights.dims(), &[1, 1, 4, 4]);

        let rows = weights.i((0, 0))?.to_vec2::<f32>()?;
        for (i, row) in rows.iter().enumerate() {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row {i} sums to {sum}");
            for (j, &w) in row.iter().enumerate() {
                if j > i {
                    assert!(w < 1e-6, "blocked weight ({i},{j}) = {w}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn multi_head_output_shape_for_every_divisor() -> Result<()> {
        for h in [1, 2, 4, 8, 16] {
            let config = TransformerConfig {
                num_heads: h,
                ..test_config()
            };
            let varmap = VarMap::new();
            let mha = MultiHeadAttention::load(test_vb(&varmap), &config)?;
            let xs = Tensor::randn(0f32, 1f32, (2, 5, 16), &Device::Cpu)?;
            let (out, weights) = mha.forward(&xs, &xs, &xs, None, false)?;
            assert_eq!(out.dims(), &[2, 5, 16]);
            assert_eq!(weights.dims(), &[2, h, 5, 5]);
        }
        Ok(())
    }

    #[test]
    fn indivisible_head_count_is_rejected() {
        let config = TransformerConfig {
            d_model: 10,
            num_heads: 3,
            ..test_config()
        };
        let varmap = VarMap::new();
        assert!(MultiHeadAttention::load(test_vb(&varmap), &config).is_err());
    }

    #[test]
    fn layer_norm_standardizes_the_last_axis() -> Result<()> {
        let config = test_config();
        let varmap = VarMap::new();
        let norm = LayerNorm::load(config.d_model, config.norm_eps, test_vb(&varmap))?;
        let xs = Tensor::randn(3f32, 5f32, (2, 3, 16), &Device::Cpu)?;
        let out = norm.forward(&xs)?;

        // gamma starts at 1 and beta at 0, so rows come out standardized
        let mean = out.mean_keepdim(D::Minus1)?.flatten_all()?.to_vec1::<f32>()?;
        for m in mean {
            assert!(m.abs() < 1e-4, "mean {m}");
        }
        let centered = out.broadcast_sub(&out.mean_keepdim(D::Minus1)?)?;
        let var = centered
            .sqr()?
            .mean_keepdim(D::Minus1)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        for v in var {
            assert!((v - 1.0).abs() < 1e-2, "variance {v}");
        }
        Ok(())
    }

    #[test]
    fn empty_encoder_stack_is_identity() -> Result<()> {
        let config = TransformerConfig {
            num_layers: 0,
            ..test_config()
        };
        let varmap = VarMap::new();
        let encoder = Encoder::load(test_vb(&varmap), &config)?;
        let xs = Tensor::randn(0f32, 1f32, (1, 3, 16), &Device::Cpu)?;
        let out = encoder.forward(&xs, None, false)?;
        let diff = (out - &xs)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn stack_layers_are_independently_parameterized() -> Result<()> {
        let config = test_config();
        let varmap = VarMap::new();
        let _encoder = Encoder::load(test_vb(&varmap), &config)?;

        let data = varmap.data().lock().unwrap();
        let layer0 = data.get("layers.0.self_attn.q_proj.weight").unwrap();
        let layer1 = data.get("layers.1.self_attn.q_proj.weight").unwrap();
        let diff = (layer0.as_tensor() - layer1.as_tensor())?
            .abs()?
            .max_all()?
            .to_scalar::<f32>()?;
        assert!(diff > 0.0, "layers share q_proj weights");
        Ok(())
    }

    #[test]
    fn generator_emits_log_probabilities() -> Result<()> {
        let config = test_config();
        let varmap = VarMap::new();
        let generator = Generator::load(test_vb(&varmap), &config)?;
        let xs = Tensor::randn(0f32, 1f32, (1, 2, 16), &Device::Cpu)?;
        let log_probs = generator.forward(&xs)?;
        assert_eq!(log_probs.dims(), &[1, 2, 11]);

        let probs_sum = log_probs.exp()?.sum(D::Minus1)?.flatten_all()?.to_vec1::<f32>()?;
        for s in probs_sum {
            assert!((s - 1.0).abs() < 1e-5, "probabilities sum to {s}");
        }
        Ok(())
    }

    #[test]
    fn mismatched_mask_length_is_an_error() -> Result<()> {
        let config = test_config();
        let varmap = VarMap::new();
        let mha = MultiHeadAttention::load(test_vb(&varmap), &config)?;
        let xs = Tensor::randn(0f32, 1f32, (1, 5, 16), &Device::Cpu)?;
        let mask = causal_mask(3, &Device::Cpu)?;
        assert!(mha.forward(&xs, &xs, &xs, Some(&mask), false).is_err());
        Ok(())
    }
}
