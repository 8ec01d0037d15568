// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//
//   train     <char_vocab> <tag_vocab> <train> <eval> <hidden>
//             <epochs> <reg> <layers> <lm> <output_dir> [flags]
//   decode    <char_vocab> <tag_vocab> <data> <lm> --model <dir>...
//   build-lm  <corpus> <output> [--order N] [--from-data]
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    decode_use_case::DecodeRequest,
    lm_use_case::BuildLmRequest,
    train_use_case::TrainConfig,
};
use crate::ml::{base_lm::DEFAULT_ORDER, decoder::DEFAULT_MAX_OUTPUT_LEN};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one transducer network per morphological tag
    Train(TrainArgs),

    /// Decode a data file with one or more trained checkpoints
    Decode(DecodeArgs),

    /// Count a character n-gram base language model
    BuildLm(BuildLmArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Character vocabulary, one token per line (must contain <s> and </s>)
    pub char_vocab: String,

    /// Tag vocabulary, one tag per line
    pub tag_vocab: String,

    /// Training data: "input chars | target chars | tag" per line
    pub train_data: String,

    /// Held-out evaluation data, same format
    pub eval_data: String,

    /// Hidden size of every LSTM layer
    pub hidden_size: usize,

    /// Number of passes over the training data
    pub epochs: usize,

    /// L2 regularisation strength
    pub reg_strength: f64,

    /// Number of stacked LSTM layers in encoder and decoder
    pub layers: usize,

    /// Base language model (JSON from `build-lm`)
    pub lm_path: String,

    /// Directory for the best checkpoint, config and metrics
    pub output_dir: String,

    /// Char embedding size [default: hidden size]
    #[arg(long)]
    pub char_dim: Option<usize>,

    /// Seed for parameter initialisation and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Longest output the decoder will produce
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_LEN)]
    pub max_output_len: usize,

    /// Abort on the first malformed or out-of-vocabulary record
    #[arg(long)]
    pub strict_data: bool,

    /// Trained checkpoint directory fused into evaluation decoding (repeatable)
    #[arg(long = "ensemble-with", value_name = "DIR")]
    pub ensemble_with: Vec<String>,

    /// Adadelta decay rate
    #[arg(long, default_value_t = 0.95)]
    pub rho: f64,

    /// Adadelta epsilon
    #[arg(long, default_value_t = 1e-6)]
    pub epsilon: f64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            char_vocab:     a.char_vocab,
            tag_vocab:      a.tag_vocab,
            train_data:     a.train_data,
            eval_data:      a.eval_data,
            hidden_size:    a.hidden_size,
            epochs:         a.epochs,
            reg_strength:   a.reg_strength,
            layers:         a.layers,
            lm_path:        a.lm_path,
            output_dir:     a.output_dir,
            char_dim:       a.char_dim,
            seed:           a.seed,
            max_output_len: a.max_output_len,
            strict_data:    a.strict_data,
            ensemble_with:  a.ensemble_with,
            rho:            a.rho,
            epsilon:        a.epsilon,
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    pub char_vocab: String,

    pub tag_vocab: String,

    /// Records to decode: "input chars | target chars | tag" per line
    pub data: String,

    /// Base language model (JSON from `build-lm`)
    pub lm_path: String,

    /// Trained checkpoint directory; repeat to decode as an ensemble
    #[arg(long = "model", value_name = "DIR", required = true)]
    pub models: Vec<String>,

    /// Longest output; defaults to the first model's training setting
    #[arg(long)]
    pub max_output_len: Option<usize>,

    #[arg(long)]
    pub strict_data: bool,
}

impl From<DecodeArgs> for DecodeRequest {
    fn from(a: DecodeArgs) -> Self {
        DecodeRequest {
            char_vocab:     a.char_vocab,
            tag_vocab:      a.tag_vocab,
            data:           a.data,
            lm_path:        a.lm_path,
            models:         a.models,
            max_output_len: a.max_output_len,
            strict_data:    a.strict_data,
        }
    }
}

#[derive(Args, Debug)]
pub struct BuildLmArgs {
    /// Space-separated characters per line, or a data file with --from-data
    pub corpus: String,

    /// Where to write the model JSON
    pub output: String,

    /// n-gram order
    #[arg(long, default_value_t = DEFAULT_ORDER)]
    pub order: usize,

    /// Read the target field of "input | target | tag" records
    #[arg(long)]
    pub from_data: bool,
}

impl From<BuildLmArgs> for BuildLmRequest {
    fn from(a: BuildLmArgs) -> Self {
        BuildLmRequest {
            corpus:    a.corpus,
            output:    a.output,
            order:     a.order,
            from_data: a.from_data,
        }
    }
}
