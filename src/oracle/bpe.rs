//! Local BPE tokenization using tiktoken

use super::config::TokenizerKind;
use super::{OracleError, TokenId};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, p50k_base, r50k_base, CoreBPE};

/// In-process tokenizer for model servers that do not expose `/tokenize`
#[derive(Clone)]
pub struct BpeTokenizer {
    bpe: Arc<CoreBPE>,
}

impl BpeTokenizer {
    /// Load the vocabulary for `kind`; `TokenizerKind::Remote` has none
    pub fn new(kind: TokenizerKind) -> Result<Self, OracleError> {
        let bpe = match kind {
            TokenizerKind::Cl100kBase => cl100k_base(),
            TokenizerKind::P50kBase => p50k_base(),
            TokenizerKind::R50kBase => r50k_base(),
            TokenizerKind::Remote => {
                return Err(OracleError::Tokenizer(
                    "remote tokenizer has no local vocabulary".to_string(),
                ))
            }
        }
        .map_err(|e| OracleError::Unavailable(format!("failed to load BPE vocabulary: {}", e)))?;

        Ok(Self { bpe: Arc::new(bpe) })
    }

    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe
            .encode_with_special_tokens(text)
            .into_iter()
            .map(|id| id as TokenId)
            .collect()
    }

    /// Decode to text; bytes of a character cut at a window edge become U+FFFD
    pub fn decode(&self, tokens: &[TokenId]) -> String {
        let ids: Vec<usize> = tokens.iter().map(|&id| id as usize).collect();
        String::from_utf8_lossy(&self.bpe._decode_native(&ids)).into_owned()
    }
}
