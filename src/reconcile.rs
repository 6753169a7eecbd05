//! Chapter time reconciliation.
//!
//! The synthesizer's candidate chapters may be out of range, overlapping or
//! zero-length. `reconcile` repairs them against the authoritative video
//! duration and is total: for any candidate list and any duration it returns
//! a sorted, gap-free, non-overlapping sequence whose first chapter starts at
//! 0 and whose last chapter ends exactly at the duration.

use crate::model::{CandidateChapter, Chapter};

/// Round a time to two decimal places of a second.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Equal-length redistribution: window `i` gets `[i*d/n, (i+1)*d/n]`.
fn redistribute(n: usize, duration: f64) -> Vec<(f64, f64)> {
    let window = duration / n as f64;
    (0..n)
        .map(|i| {
            (
                round2(i as f64 * window),
                round2((i + 1) as f64 * window),
            )
        })
        .collect()
}

/// Repair candidate chapter times against the authoritative duration.
///
/// If any candidate is unusable (`start >= duration`, `end > duration` or
/// `end <= start`) the entire set is discarded and the duration is split
/// into equal windows, carrying over only the non-time fields in order.
/// Otherwise each candidate is clamped into `[0, duration]` and the
/// sequence is made contiguous left to right. Either way the last chapter
/// is forced to end exactly at the duration and all times are rounded to
/// two decimals.
///
/// Empty candidates or a non-positive duration produce an empty list. At
/// two-decimal resolution the duration holds at most `100 * duration`
/// positive-length chapters; surplus candidates beyond that are dropped so
/// that no output chapter collapses to zero length.
pub fn reconcile(video_id: &str, candidates: &[CandidateChapter], duration: f64) -> Vec<Chapter> {
    let duration = round2(duration);
    if candidates.is_empty() || duration <= 0.0 {
        return Vec::new();
    }

    let max_chapters = ((duration * 100.0).round() as usize).max(1);
    let candidates = &candidates[..candidates.len().min(max_chapters)];
    let n = candidates.len();
    let average = duration / n as f64;

    let unreliable = candidates
        .iter()
        .any(|c| c.start_time >= duration || c.end_time > duration || c.end_time <= c.start_time);

    let mut spans = if unreliable {
        redistribute(n, duration)
    } else {
        let mut spans: Vec<(f64, f64)> = Vec::with_capacity(n);
        for c in candidates {
            let start = c.start_time.clamp(0.0, duration);
            let mut end = c.end_time.clamp(0.0, duration);
            if end <= start {
                end = (start + average).min(duration);
            }
            spans.push((start, end));
        }

        // Enforce contiguity: the first chapter opens the video, every
        // later chapter starts where the previous one ended. This repairs
        // overlaps and closes gaps in one pass.
        spans[0].0 = 0.0;
        for i in 1..n {
            let prev_end = spans[i - 1].1;
            spans[i].0 = prev_end;
            if spans[i].1 <= spans[i].0 {
                spans[i].1 = (spans[i].0 + average).min(duration);
            }
        }

        for span in spans.iter_mut() {
            span.0 = round2(span.0);
            span.1 = round2(span.1);
        }
        spans[n - 1].1 = duration;

        // If contiguity repair collapsed a chapter to zero length (an
        // earlier candidate already consumed the whole duration), the set
        // was unreliable after all.
        if spans.iter().any(|(s, e)| e <= s) {
            redistribute(n, duration)
        } else {
            spans
        }
    };

    spans[n - 1].1 = duration;

    candidates
        .iter()
        .zip(spans)
        .enumerate()
        .map(|(i, (c, (start, end)))| Chapter {
            video_id: video_id.to_string(),
            index: (i + 1) as u32,
            start_time: start,
            end_time: end,
            title: c.title.clone(),
            description: c.description.clone(),
            excerpt: c.key_points.join("; "),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(start: f64, end: f64, title: &str) -> CandidateChapter {
        CandidateChapter {
            index: 0,
            start_time: start,
            end_time: end,
            title: title.to_string(),
            description: String::new(),
            key_points: Vec::new(),
        }
    }

    fn assert_valid(chapters: &[Chapter], duration: f64) {
        if chapters.is_empty() {
            return;
        }
        assert_eq!(chapters[0].start_time, 0.0, "first chapter must start at 0");
        assert_eq!(
            chapters.last().unwrap().end_time,
            round2(duration),
            "last chapter must end at the duration"
        );
        for (i, ch) in chapters.iter().enumerate() {
            assert_eq!(ch.index, (i + 1) as u32);
            assert!(
                ch.end_time > ch.start_time,
                "chapter {} has non-positive length: [{}, {}]",
                ch.index,
                ch.start_time,
                ch.end_time
            );
            assert_eq!(round2(ch.start_time), ch.start_time, "start not rounded");
            assert_eq!(round2(ch.end_time), ch.end_time, "end not rounded");
            if i > 0 {
                assert_eq!(
                    ch.start_time,
                    chapters[i - 1].end_time,
                    "gap or overlap between chapters {} and {}",
                    i,
                    i + 1
                );
            }
        }
    }

    #[test]
    fn test_empty_candidates() {
        assert!(reconcile("v", &[], 600.0).is_empty());
    }

    #[test]
    fn test_zero_duration() {
        let candidates = vec![candidate(0.0, 300.0, "A")];
        assert!(reconcile("v", &candidates, 0.0).is_empty());
        assert!(reconcile("v", &candidates, -5.0).is_empty());
    }

    #[test]
    fn test_single_chapter_spans_whole_duration() {
        let candidates = vec![candidate(10.0, 200.0, "Only")];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].start_time, 0.0);
        assert_eq!(chapters[0].end_time, 600.0);
        assert_valid(&chapters, 600.0);
    }

    #[test]
    fn test_well_formed_candidates_pass_through() {
        let candidates = vec![
            candidate(0.0, 300.0, "Intro"),
            candidate(300.0, 900.0, "Main"),
            candidate(900.0, 1200.0, "Outro"),
        ];
        let chapters = reconcile("v", &candidates, 1200.0);

        assert_eq!(chapters.len(), 3);
        assert_eq!((chapters[0].start_time, chapters[0].end_time), (0.0, 300.0));
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (300.0, 900.0));
        assert_eq!((chapters[2].start_time, chapters[2].end_time), (900.0, 1200.0));
        assert_valid(&chapters, 1200.0);
    }

    #[test]
    fn test_invalid_candidate_triggers_full_redistribution() {
        // Second candidate has end <= start, so the whole set is discarded
        // in favor of equal windows; titles survive in order.
        let candidates = vec![candidate(0.0, 5000.0, "A"), candidate(100.0, 50.0, "B")];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].start_time, chapters[0].end_time), (0.0, 300.0));
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (300.0, 600.0));
        assert_eq!(chapters[0].title, "A");
        assert_eq!(chapters[1].title, "B");
        assert_valid(&chapters, 600.0);
    }

    #[test]
    fn test_out_of_range_end_triggers_redistribution() {
        let candidates = vec![candidate(0.0, 700.0, "A"), candidate(100.0, 200.0, "B")];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!((chapters[0].start_time, chapters[0].end_time), (0.0, 300.0));
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (300.0, 600.0));
    }

    #[test]
    fn test_boundary_overlap_is_pulled_forward() {
        let candidates = vec![
            candidate(0.0, 200.0, "A"),
            candidate(190.0, 400.0, "B"),
            candidate(400.0, 600.0, "C"),
        ];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!((chapters[0].start_time, chapters[0].end_time), (0.0, 200.0));
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (200.0, 400.0));
        assert_eq!((chapters[2].start_time, chapters[2].end_time), (400.0, 600.0));
        assert_valid(&chapters, 600.0);
    }

    #[test]
    fn test_gap_between_candidates_is_closed() {
        let candidates = vec![candidate(0.0, 200.0, "A"), candidate(350.0, 600.0, "B")];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!((chapters[0].start_time, chapters[0].end_time), (0.0, 200.0));
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (200.0, 600.0));
        assert_valid(&chapters, 600.0);
    }

    #[test]
    fn test_residual_rounding_gap_is_closed_at_the_end() {
        let candidates = vec![
            candidate(0.0, 199.999, "A"),
            candidate(199.999, 599.99, "B"),
        ];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!(chapters.last().unwrap().end_time, 600.0);
        assert_valid(&chapters, 600.0);
    }

    #[test]
    fn test_greedy_first_candidate_falls_back_to_redistribution() {
        // The first candidate swallows the full duration; contiguity repair
        // would leave the second chapter empty, so the set is redistributed.
        let candidates = vec![candidate(0.0, 600.0, "A"), candidate(10.0, 600.0, "B")];
        let chapters = reconcile("v", &candidates, 600.0);

        assert_eq!(chapters.len(), 2);
        assert_valid(&chapters, 600.0);
        assert_eq!(chapters[0].title, "A");
        assert_eq!(chapters[1].title, "B");
    }

    #[test]
    fn test_tiny_duration_drops_surplus_candidates() {
        // 0.05s only fits five distinct two-decimal windows; the first
        // five candidates survive, each with positive length.
        let candidates: Vec<CandidateChapter> = (0..10)
            .map(|i| candidate(6000.0, 0.0, &format!("c{}", i)))
            .collect();
        let chapters = reconcile("v", &candidates, 0.05);

        assert_eq!(chapters.len(), 5);
        assert_eq!(chapters[0].title, "c0");
        assert_eq!(chapters[4].title, "c4");
        assert_valid(&chapters, 0.05);
    }

    #[test]
    fn test_non_time_fields_carried_over() {
        let mut c = candidate(-10.0, 9999.0, "Broken times");
        c.description = "still useful prose".to_string();
        c.key_points = vec!["one".to_string(), "two".to_string()];

        let chapters = reconcile("vid-9", &[c], 120.0);
        assert_eq!(chapters[0].video_id, "vid-9");
        assert_eq!(chapters[0].title, "Broken times");
        assert_eq!(chapters[0].description, "still useful prose");
        assert_eq!(chapters[0].excerpt, "one; two");
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let candidates = vec![
            candidate(0.0, 123.456789, "A"),
            candidate(123.456789, 300.0, "B"),
        ];
        let chapters = reconcile("v", &candidates, 300.0);

        for ch in &chapters {
            assert_eq!(round2(ch.start_time), ch.start_time);
            assert_eq!(round2(ch.end_time), ch.end_time);
        }
        assert_eq!(chapters[0].end_time, 123.46);
    }

    fn arb_candidate() -> impl Strategy<Value = CandidateChapter> {
        (-500.0f64..50000.0, -500.0f64..50000.0).prop_map(|(start, end)| CandidateChapter {
            index: 0,
            start_time: start,
            end_time: end,
            title: "t".to_string(),
            description: String::new(),
            key_points: Vec::new(),
        })
    }

    proptest! {
        /// Totality: any candidate list and any positive duration down to
        /// the two-decimal resolution yields a sorted, contiguous, strictly
        /// positive-length, duration-bounded chapter sequence.
        #[test]
        fn prop_reconcile_is_total(
            candidates in proptest::collection::vec(arb_candidate(), 0..40),
            duration in 0.01f64..36000.0,
        ) {
            let chapters = reconcile("v", &candidates, duration);

            let fit = ((round2(duration) * 100.0).round() as usize).max(1);
            let expected = if candidates.is_empty() {
                0
            } else {
                candidates.len().min(fit)
            };
            prop_assert_eq!(chapters.len(), expected);
            if !chapters.is_empty() {
                prop_assert_eq!(chapters[0].start_time, 0.0);
                prop_assert_eq!(chapters.last().unwrap().end_time, round2(duration));
                for (i, ch) in chapters.iter().enumerate() {
                    prop_assert!(ch.end_time > ch.start_time);
                    prop_assert!(ch.end_time <= round2(duration));
                    prop_assert_eq!(round2(ch.start_time), ch.start_time);
                    prop_assert_eq!(round2(ch.end_time), ch.end_time);
                    if i > 0 {
                        prop_assert_eq!(ch.start_time, chapters[i - 1].end_time);
                    }
                }
            }
        }

        /// The redistribution path preserves candidate order in the
        /// carried-over titles.
        #[test]
        fn prop_redistribution_preserves_order(n in 1usize..20, duration in 60.0f64..7200.0) {
            let candidates: Vec<CandidateChapter> = (0..n)
                .map(|i| CandidateChapter {
                    index: i as u32 + 1,
                    start_time: duration + 1.0, // always invalid
                    end_time: 0.0,
                    title: format!("title-{}", i),
                    description: String::new(),
                    key_points: Vec::new(),
                })
                .collect();

            let chapters = reconcile("v", &candidates, duration);
            for (i, ch) in chapters.iter().enumerate() {
                prop_assert_eq!(&ch.title, &format!("title-{}", i));
            }
        }
    }
}
