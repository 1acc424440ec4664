//! Scripted in-memory oracle for summarizer tests
//!
//! Tokens are whitespace-separated words. A "summary" is the first
//! `min_new_tokens` words of the input after the prefix, so the output of
//! every call is predictable from its input.

#![allow(dead_code)]

use async_trait::async_trait;
use news_digest::oracle::{
    BpeTokenizer, GenerationBounds, OracleError, SequenceOracle, TokenId, TokenizerKind,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const PREFIX_WORD: &str = "summarize:";

#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub input_len: usize,
    pub input_text: String,
    pub bounds: GenerationBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Return the first `min_new_tokens` words
    Lead,
    /// Return the whole input back
    Echo,
}

#[derive(Default)]
struct Vocabulary {
    ids: HashMap<String, TokenId>,
    words: Vec<String>,
}

pub struct WordOracle {
    vocab: Mutex<Vocabulary>,
    calls: Mutex<Vec<GenerateCall>>,
    behaviour: Behaviour,
    max_input_tokens: usize,
    fail_on_call: Option<usize>,
    tokenize_fails: bool,
    /// Per-call delay, indexed by generate call number
    delays: Vec<Duration>,
}

impl WordOracle {
    pub fn new() -> Self {
        Self {
            vocab: Mutex::new(Vocabulary::default()),
            calls: Mutex::new(Vec::new()),
            behaviour: Behaviour::Lead,
            max_input_tokens: 512,
            fail_on_call: None,
            tokenize_fails: false,
            delays: Vec::new(),
        }
    }

    pub fn with_behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Make the `n`-th generate call (0-based) fail
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Make every tokenize call fail, as a server without a tokenizer would
    pub fn failing_tokenize(mut self) -> Self {
        self.tokenize_fails = true;
        self
    }

    pub fn with_max_input_tokens(mut self, max: usize) -> Self {
        self.max_input_tokens = max;
        self
    }

    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    fn words_of(&self, tokens: &[TokenId]) -> Vec<String> {
        let vocab = self.vocab.lock().unwrap();
        tokens
            .iter()
            .map(|&id| vocab.words[id as usize].clone())
            .collect()
    }
}

/// `count` distinct words: "w0 w1 w2 ..."
pub fn words(count: usize) -> String {
    (0..count)
        .map(|i| format!("w{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SequenceOracle for WordOracle {
    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, OracleError> {
        if self.tokenize_fails {
            return Err(OracleError::UpstreamError {
                status: 404,
                body: "no tokenizer loaded".to_string(),
            });
        }
        let mut vocab = self.vocab.lock().unwrap();
        Ok(text
            .split_whitespace()
            .map(|word| {
                if let Some(&id) = vocab.ids.get(word) {
                    return id;
                }
                let id = vocab.words.len() as TokenId;
                vocab.words.push(word.to_string());
                vocab.ids.insert(word.to_string(), id);
                id
            })
            .collect())
    }

    async fn decode(&self, tokens: &[TokenId]) -> Result<String, OracleError> {
        Ok(self.words_of(tokens).join(" "))
    }

    async fn generate_summary(
        &self,
        tokens: &[TokenId],
        bounds: GenerationBounds,
    ) -> Result<String, OracleError> {
        if tokens.len() > self.max_input_tokens {
            return Err(OracleError::InputTooLong {
                len: tokens.len(),
                limit: self.max_input_tokens,
            });
        }

        let words = self.words_of(tokens);
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(GenerateCall {
                input_len: tokens.len(),
                input_text: words.join(" "),
                bounds,
            });
            calls.len() - 1
        };

        if let Some(delay) = self.delays.get(index) {
            tokio::time::sleep(*delay).await;
        }

        if self.fail_on_call == Some(index) {
            return Err(OracleError::UpstreamError {
                status: 500,
                body: "CUDA out of memory".to_string(),
            });
        }

        let body = words.iter().skip_while(|w| w.as_str() == PREFIX_WORD);
        let summary: Vec<&str> = match self.behaviour {
            Behaviour::Lead => body.take(bounds.min_new_tokens).map(String::as_str).collect(),
            Behaviour::Echo => body.map(String::as_str).collect(),
        };
        Ok(summary.join(" "))
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }
}

/// Oracle over a real BPE vocabulary; a summary is the decoded tail of the input
pub struct BpeOracle {
    bpe: BpeTokenizer,
}

impl BpeOracle {
    pub fn new(kind: TokenizerKind) -> Self {
        Self {
            bpe: BpeTokenizer::new(kind).unwrap(),
        }
    }
}

#[async_trait]
impl SequenceOracle for BpeOracle {
    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, OracleError> {
        Ok(self.bpe.encode(text))
    }

    async fn decode(&self, tokens: &[TokenId]) -> Result<String, OracleError> {
        Ok(self.bpe.decode(tokens))
    }

    async fn generate_summary(
        &self,
        tokens: &[TokenId],
        bounds: GenerationBounds,
    ) -> Result<String, OracleError> {
        if tokens.len() > 512 {
            return Err(OracleError::InputTooLong {
                len: tokens.len(),
                limit: 512,
            });
        }
        let start = tokens.len().saturating_sub(bounds.min_new_tokens);
        Ok(self.bpe.decode(&tokens[start..]))
    }

    fn max_input_tokens(&self) -> usize {
        512
    }
}
