//! Post-debate scorecard.
//!
//! Two awards come straight from the transcript; the other two come from an
//! external highlight pass that is allowed to fail without taking the local
//! awards down with it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{Highlight, HighlightAnalyzer};
use crate::participant::RoleSlot;
use crate::prompt::TranscriptEntry;
use crate::turn::{Turn, TurnKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationLeader {
    pub speaker: String,
    pub citations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudienceFavorite {
    pub turn_id: String,
    pub speaker: String,
    pub quote: String,
    pub approvals: u32,
    /// True when nobody voted and the favorite was picked by fallback.
    pub by_fallback: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scorecard {
    pub most_cited: Option<CitationLeader>,
    pub audience_favorite: Option<AudienceFavorite>,
    pub savage_takedown: Option<Highlight>,
    pub wildest_non_sequitur: Option<Highlight>,
}

/// Speaker with the strictly highest citation count. Ties go to whoever
/// spoke first; nobody wins when there are no citations at all.
pub fn most_cited(turns: &[Turn]) -> Option<CitationLeader> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for turn in turns {
        match counts.iter_mut().find(|(s, _)| *s == turn.speaker) {
            Some((_, n)) => *n += turn.sources.len(),
            None => counts.push((turn.speaker.as_str(), turn.sources.len())),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (speaker, n) in counts {
        if n > 0 && best.is_none_or(|(_, b)| n > b) {
            best = Some((speaker, n));
        }
    }
    best.map(|(speaker, citations)| CitationLeader {
        speaker: speaker.to_string(),
        citations,
    })
}

/// Turn with the most approvals. Without any votes, the first turn spoken by
/// a debater (anyone but the moderator) wins.
pub fn audience_favorite(turns: &[Turn]) -> Option<AudienceFavorite> {
    let mut best: Option<&Turn> = None;
    for turn in turns.iter().filter(|t| t.approvals > 0) {
        if best.is_none_or(|b| turn.approvals > b.approvals) {
            best = Some(turn);
        }
    }

    let (turn, by_fallback) = match best {
        Some(turn) => (turn, false),
        None => {
            let fallback = turns
                .iter()
                .find(|t| {
                    t.role != RoleSlot::Moderator && matches!(t.kind, TurnKind::Ordinary { .. })
                })
                .or_else(|| turns.first())?;
            (fallback, true)
        }
    };

    Some(AudienceFavorite {
        turn_id: turn.id.clone(),
        speaker: turn.speaker.clone(),
        quote: turn.text.clone(),
        approvals: turn.approvals,
        by_fallback,
    })
}

/// Build the full scorecard for a finished transcript.
pub async fn score_transcript(
    topic: &str,
    turns: &[Turn],
    analyzer: &dyn HighlightAnalyzer,
) -> Scorecard {
    let mut card = Scorecard {
        most_cited: most_cited(turns),
        audience_favorite: audience_favorite(turns),
        ..Scorecard::default()
    };

    let transcript: Vec<TranscriptEntry> = turns.iter().map(TranscriptEntry::from).collect();
    match analyzer.analyze(topic, &transcript).await {
        Ok(highlights) => {
            card.savage_takedown = Some(highlights.takedown);
            card.wildest_non_sequitur = Some(highlights.non_sequitur);
        }
        Err(e) => {
            warn!(error = %e, "highlight analysis failed, keeping local awards only");
        }
    }

    info!(
        most_cited = card.most_cited.as_ref().map(|c| c.speaker.as_str()),
        favorite = card.audience_favorite.as_ref().map(|f| f.speaker.as_str()),
        highlights = card.savage_takedown.is_some(),
        "scorecard ready"
    );
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Highlights;
    use crate::error::DebateError;
    use crate::turn::{Slot, Source};
    use async_trait::async_trait;

    fn turn(role: RoleSlot, speaker: &str, citations: usize, approvals: u32) -> Turn {
        let sources = (0..citations)
            .map(|i| Source::new(format!("https://example.com/{speaker}/{i}"), "src"))
            .collect();
        let mut t = Turn::new(
            Slot::Ordinary { role, round: 1 },
            speaker,
            format!("{speaker} speaks"),
            sources,
        );
        t.approvals = approvals;
        t
    }

    fn debate(citations: [usize; 4]) -> Vec<Turn> {
        vec![
            turn(RoleSlot::Moderator, "M", citations[0], 0),
            turn(RoleSlot::Proponent, "P", citations[1], 0),
            turn(RoleSlot::Opponent, "O", citations[2], 0),
            turn(RoleSlot::Disruptor, "D", citations[3], 0),
        ]
    }

    struct FixedAnalyzer(bool);

    #[async_trait]
    impl HighlightAnalyzer for FixedAnalyzer {
        async fn analyze(
            &self,
            _topic: &str,
            _transcript: &[TranscriptEntry],
        ) -> Result<Highlights, DebateError> {
            if !self.0 {
                return Err(DebateError::Analysis("model refused".into()));
            }
            Ok(Highlights {
                takedown: Highlight {
                    speaker: "O".into(),
                    quote: "ouch".into(),
                },
                non_sequitur: Highlight {
                    speaker: "D".into(),
                    quote: "ducks".into(),
                },
            })
        }
    }

    #[test]
    fn test_most_cited_strict_max() {
        let leader = most_cited(&debate([0, 1, 3, 2])).unwrap();
        assert_eq!(leader.speaker, "O");
        assert_eq!(leader.citations, 3);
    }

    #[test]
    fn test_most_cited_sums_across_turns_and_breaks_ties_by_first_speaker() {
        let mut turns = debate([0, 2, 2, 0]);
        assert_eq!(most_cited(&turns).unwrap().speaker, "P");

        turns.push(turn(RoleSlot::Opponent, "O", 1, 0));
        assert_eq!(most_cited(&turns).unwrap().speaker, "O");
    }

    #[test]
    fn test_most_cited_none_without_citations() {
        assert!(most_cited(&debate([0, 0, 0, 0])).is_none());
    }

    #[test]
    fn test_audience_favorite_by_votes() {
        let mut turns = debate([0; 4]);
        turns[2].approvals = 2;
        turns[3].approvals = 5;
        turns[1].approvals = 5;
        let fav = audience_favorite(&turns).unwrap();
        assert_eq!(fav.speaker, "P");
        assert_eq!(fav.approvals, 5);
        assert!(!fav.by_fallback);
    }

    #[test]
    fn test_audience_favorite_fallback_skips_moderator() {
        let fav = audience_favorite(&debate([0; 4])).unwrap();
        assert_eq!(fav.speaker, "P");
        assert!(fav.by_fallback);
    }

    #[test]
    fn test_audience_favorite_fallback_with_only_moderator() {
        let turns = vec![turn(RoleSlot::Moderator, "M", 0, 0)];
        assert_eq!(audience_favorite(&turns).unwrap().speaker, "M");
        assert!(audience_favorite(&[]).is_none());
    }

    #[tokio::test]
    async fn test_score_merges_highlights() {
        let card = score_transcript("t", &debate([0, 1, 0, 0]), &FixedAnalyzer(true)).await;
        assert_eq!(card.most_cited.unwrap().speaker, "P");
        assert_eq!(card.savage_takedown.unwrap().quote, "ouch");
        assert_eq!(card.wildest_non_sequitur.unwrap().speaker, "D");
    }

    #[tokio::test]
    async fn test_score_keeps_local_awards_when_analysis_fails() {
        let card = score_transcript("t", &debate([0, 0, 4, 0]), &FixedAnalyzer(false)).await;
        assert_eq!(card.most_cited.unwrap().speaker, "O");
        assert!(card.audience_favorite.is_some());
        assert!(card.savage_takedown.is_none());
        assert!(card.wildest_non_sequitur.is_none());
    }
}
