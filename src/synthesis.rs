//! Chapter synthesis: LLM-proposed chapters with a deterministic fallback.
//!
//! The synthesizer never fails. When no language model is configured, or
//! the primary path errors in any way (transport failure, malformed
//! output), it degrades to a fixed-window segmenter built purely from the
//! transcript. Output times are candidates only; the reconciler owns
//! validity.

use crate::config::SynthesisConfig;
use crate::error::PipelineError;
use crate::llm::{ChatMessage, Llm};
use crate::model::{CandidateChapter, Transcript, TranscriptSegment};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You segment video transcripts into chapters. \
Respond with a single JSON object of the form \
{\"chapters\": [{\"index\": 1, \"startTime\": 0, \"endTime\": 120, \
\"title\": \"...\", \"description\": \"...\", \"keyPoints\": [\"...\"]}]}. \
Times are seconds from the start of the video. Do not include any text \
outside the JSON object.";

#[derive(Debug, Deserialize)]
struct SynthesisPayload {
    chapters: Vec<CandidateChapter>,
}

/// Generates candidate chapters from a transcript.
pub struct ChapterSynthesizer {
    llm: Option<Box<dyn Llm>>,
    config: SynthesisConfig,
}

impl ChapterSynthesizer {
    pub fn new(llm: Option<Box<dyn Llm>>, config: SynthesisConfig) -> Self {
        Self { llm, config }
    }

    /// Propose chapters for a transcript. Never fails and never returns an
    /// empty list for a positive duration.
    pub async fn generate_chapters(
        &self,
        transcript: &Transcript,
        duration_seconds: f64,
    ) -> Vec<CandidateChapter> {
        if let Some(llm) = &self.llm {
            match self
                .synthesize_with_llm(llm.as_ref(), transcript, duration_seconds)
                .await
            {
                Ok(chapters) if !chapters.is_empty() => {
                    debug!("language model proposed {} chapters", chapters.len());
                    return chapters;
                }
                Ok(_) => warn!("language model proposed no chapters, using fallback segmenter"),
                Err(e) => warn!("chapter synthesis failed ({}), using fallback segmenter", e),
            }
        }

        self.fallback_chapters(&transcript.segments, duration_seconds)
    }

    async fn synthesize_with_llm(
        &self,
        llm: &dyn Llm,
        transcript: &Transcript,
        duration_seconds: f64,
    ) -> anyhow::Result<Vec<CandidateChapter>> {
        let prompt = self.build_prompt(transcript, duration_seconds);
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        let response = llm.chat(messages).await?;
        let chapters = parse_chapter_payload(&response.content)?;
        Ok(chapters)
    }

    fn build_prompt(&self, transcript: &Transcript, duration_seconds: f64) -> String {
        let mut text = transcript.full_text.clone();
        if text.len() > self.config.transcript_char_budget {
            let mut cut = self.config.transcript_char_budget;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("\n[transcript truncated]");
        }

        let sample = transcript
            .segments
            .iter()
            .take(self.config.segment_sample)
            .map(|s| format!("[{:.1}-{:.1}] {}", s.start, s.end, s.text))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "The video is {:.0} seconds long.\n\n\
             Timed excerpts:\n{}\n\n\
             Full transcript:\n{}",
            duration_seconds, sample, text
        )
    }

    /// Deterministic fixed-window segmentation. Calls no external service
    /// and cannot fail; this is the availability guarantee when the
    /// language model is down.
    fn fallback_chapters(
        &self,
        segments: &[TranscriptSegment],
        duration_seconds: f64,
    ) -> Vec<CandidateChapter> {
        let window = self.config.fallback_window_seconds.max(1.0);
        let count = ((duration_seconds / window).ceil() as usize).max(1);

        (0..count)
            .map(|i| {
                let start = i as f64 * window;
                let end = if i + 1 == count {
                    duration_seconds.max(start)
                } else {
                    (i as f64 + 1.0) * window
                };

                let in_window: Vec<&TranscriptSegment> = segments
                    .iter()
                    .filter(|s| s.start >= start && s.start < end)
                    .collect();

                let title = in_window
                    .first()
                    .map(|s| truncate_title(&s.text))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| format!("Part {}", i + 1));

                let description = in_window
                    .iter()
                    .take(3)
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");

                let key_points = in_window
                    .iter()
                    .take(3)
                    .map(|s| s.text.clone())
                    .collect();

                CandidateChapter {
                    index: (i + 1) as u32,
                    start_time: start,
                    end_time: end,
                    title,
                    description,
                    key_points,
                }
            })
            .collect()
    }
}

fn truncate_title(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= 60 {
        return text.to_string();
    }
    let truncated: String = text.chars().take(57).collect();
    format!("{}...", truncated.trim_end())
}

/// Extract the `{"chapters": [...]}` payload from LLM output.
///
/// Models routinely wrap JSON in fenced code blocks or surround it with
/// prose; this strips the fence or slices from the first `{` to the last
/// `}` before parsing. A missing or non-array `chapters` key is a
/// `MalformedSynthesis` error.
pub fn parse_chapter_payload(text: &str) -> Result<Vec<CandidateChapter>, PipelineError> {
    let json = extract_json_object(text)
        .ok_or_else(|| PipelineError::MalformedSynthesis("no JSON object in response".into()))?;

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PipelineError::MalformedSynthesis(format!("invalid JSON: {}", e)))?;

    if !value.get("chapters").map_or(false, |c| c.is_array()) {
        return Err(PipelineError::MalformedSynthesis(
            "missing or non-array `chapters` key".into(),
        ));
    }

    let payload: SynthesisPayload = serde_json::from_value(value)
        .map_err(|e| PipelineError::MalformedSynthesis(format!("bad chapter entry: {}", e)))?;

    Ok(payload.chapters)
}

fn extract_json_object(text: &str) -> Option<&str> {
    // A fenced block wins; the fence language tag is optional.
    let fence = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex");
    if let Some(captures) = fence.captures(text) {
        return Some(captures.get(1).expect("fence capture").as_str());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
