//! Write-once debate artifacts: the Markdown transcript and file naming.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::error::DebateError;
use crate::scoring::Scorecard;
use crate::turn::{Turn, TurnKind};

const MAX_TOPIC_CHARS: usize = 50;

/// Render the transcript as a Markdown document.
pub fn transcript_markdown(topic: &str, turns: &[Turn], scorecard: Option<&Scorecard>) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# Fight Club: {}\n", topic.trim());

    for turn in turns {
        match turn.kind {
            TurnKind::Ordinary { round } => {
                let _ = writeln!(doc, "## Round {}: {}\n", round, turn.speaker);
            }
            TurnKind::Verdict => {
                let _ = writeln!(doc, "## Final Verdict: {}\n", turn.speaker);
            }
        }

        let body = turn.text.trim();
        if !body.is_empty() {
            let _ = writeln!(doc, "{}\n", body);
        }

        if !turn.sources.is_empty() {
            doc.push_str("**Sources**\n\n");
            for source in &turn.sources {
                let title = if source.title.is_empty() {
                    &source.uri
                } else {
                    &source.title
                };
                let _ = writeln!(doc, "- [{}]({})", title, source.uri);
            }
            doc.push('\n');
        }
    }

    if let Some(card) = scorecard {
        doc.push_str(&scorecard_markdown(card));
    }

    doc
}

fn scorecard_markdown(card: &Scorecard) -> String {
    let mut out = String::from("## Scorecard\n\n");

    match &card.most_cited {
        Some(leader) => {
            let _ = writeln!(
                out,
                "- **Most cited:** {} ({} sources)",
                leader.speaker, leader.citations
            );
        }
        None => out.push_str("- **Most cited:** nobody cited anything\n"),
    }

    if let Some(fav) = &card.audience_favorite {
        let note = if fav.by_fallback {
            "no votes cast".to_string()
        } else {
            format!("{} approvals", fav.approvals)
        };
        let _ = writeln!(
            out,
            "- **Audience favorite:** {} ({}): \"{}\"",
            fav.speaker,
            note,
            excerpt(&fav.quote, 160)
        );
    }

    if let Some(h) = &card.savage_takedown {
        let _ = writeln!(out, "- **Savage takedown:** {}: \"{}\"", h.speaker, h.quote);
    }
    if let Some(h) = &card.wildest_non_sequitur {
        let _ = writeln!(
            out,
            "- **Wildest non-sequitur:** {}: \"{}\"",
            h.speaker, h.quote
        );
    }

    out
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Topic reduced to something safe for a file name.
pub fn sanitize_topic(topic: &str) -> String {
    let cleaned: String = topic
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_TOPIC_CHARS).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        "debate".to_string()
    } else {
        truncated.to_string()
    }
}

/// Default artifact name, e.g. `Fight Club - Cats vs dogs.md`.
pub fn output_filename(topic: &str, extension: &str) -> String {
    format!(
        "Fight Club - {}.{}",
        sanitize_topic(topic),
        extension.trim_start_matches('.')
    )
}

/// Write the Markdown transcript to `path`.
pub fn save_transcript<P: AsRef<Path>>(
    path: P,
    topic: &str,
    turns: &[Turn],
    scorecard: Option<&Scorecard>,
) -> Result<(), DebateError> {
    let path = path.as_ref();
    std::fs::write(path, transcript_markdown(topic, turns, scorecard))?;
    info!(path = %path.display(), turns = turns.len(), "transcript saved");
    Ok(())
}

/// Write an assembled WAV container to `path`.
pub fn save_audio<P: AsRef<Path>>(path: P, wav: &[u8]) -> Result<(), DebateError> {
    let path = path.as_ref();
    std::fs::write(path, wav)?;
    info!(path = %path.display(), bytes = wav.len(), "audio saved");
    Ok(())
}
