#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use askpdf::config::Config;
use askpdf::embedding::Embedder;
use askpdf::generation::{GenerationError, Generator};
use askpdf::knowledge::KnowledgeBase;

/// One dimension per keyword plus a small constant so no vector is zero.
pub const VOCABULARY: &[&str] = &[
    "oath", "salary", "transfer", "complaint", "training", "uniform",
];

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = VOCABULARY
        .iter()
        .map(|term| lower.matches(term).count() as f32)
        .collect();
    v.push(0.05);
    v
}

/// Deterministic keyword-count embedder that counts its calls.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(keyword_vector(text))
    }
}

/// Records every prompt and answers with a fixed reply.
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub reply: Result<String, fn() -> GenerationError>,
}

impl RecordingGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(error: fn() -> GenerationError) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply: Err(error),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording-test"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }
}

/// Five pages, each about one topic, separated by form feeds.
pub const ACT_TEXT: &str = "Chapter I. Every officer shall take an oath of allegiance.\x0c\
Chapter II. The salary of constables is fixed by the Government.\x0c\
Chapter III. A transfer order shall be issued in writing.\x0c\
Chapter IV. Any complaint against an officer is heard by the Authority.\x0c\
Chapter V. Training and uniform standards are prescribed by rules.";

pub fn write_act(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("act.txt");
    std::fs::write(&path, ACT_TEXT).unwrap();
    path
}

pub fn config_for(document: &Path) -> Config {
    let mut config = Config::default();
    config.document.path = document.to_path_buf();
    config
}

pub async fn build_kb(
    config: &Config,
    embedder: Arc<KeywordEmbedder>,
    generator: Arc<RecordingGenerator>,
) -> KnowledgeBase {
    KnowledgeBase::build(config, embedder, generator)
        .await
        .expect("knowledge base should build")
}

/// Minimal valid single-page PDF showing `phrase`, with correct xref offsets.
pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
