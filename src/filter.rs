//! Candidate selection: which posts are usable as widescreen wallpapers.

use rand::seq::SliceRandom;
use rand_chacha::ChaChaRng;

use crate::danbooru::Candidate;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
pub const TARGET_ASPECT: f64 = 16.0 / 9.0;
pub const ASPECT_TOLERANCE: f64 = 0.1;

/// Keep the candidates usable as wallpapers: a real image file in an
/// allowed format, sane dimensions, and close enough to 16:9.
pub fn suitable(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.into_iter().filter(is_suitable).collect()
}

fn is_suitable(candidate: &Candidate) -> bool {
    if candidate.file_url.is_none() {
        return false;
    }
    let Some(ext) = candidate.file_ext.as_deref() else {
        return false;
    };
    if !ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return false;
    }
    if candidate.height == 0 {
        return false;
    }
    let ratio = f64::from(candidate.width) / f64::from(candidate.height);
    (ratio - TARGET_ASPECT).abs() < ASPECT_TOLERANCE
}

/// Uniform random choice among the suitable candidates.
pub fn pick<'a>(candidates: &'a [Candidate], rng: &mut ChaChaRng) -> Option<&'a Candidate> {
    candidates.choose(rng)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn candidate(id: u64, width: u32, height: u32, ext: &str) -> Candidate {
        Candidate {
            id,
            file_url: Some(format!("https://cdn.donmai.us/original/{id}.{ext}")),
            file_ext: Some(ext.to_string()),
            width,
            height,
        }
    }

    #[test]
    fn output_is_a_subset_satisfying_every_predicate() {
        let input = vec![
            candidate(1, 1920, 1080, "jpg"),
            candidate(2, 1600, 1200, "jpg"),
            candidate(3, 2560, 1440, "png"),
            candidate(4, 1920, 1080, "webm"),
            candidate(5, 1000, 0, "jpg"),
            Candidate {
                file_url: None,
                ..candidate(6, 1920, 1080, "jpg")
            },
        ];
        let kept = suitable(input.clone());
        for candidate in &kept {
            assert!(input.contains(candidate));
            let ext = candidate.file_ext.as_deref().unwrap().to_ascii_lowercase();
            assert!(ALLOWED_EXTENSIONS.contains(&ext.as_str()));
            assert!(candidate.height > 0);
            let ratio = f64::from(candidate.width) / f64::from(candidate.height);
            assert!((ratio - TARGET_ASPECT).abs() < ASPECT_TOLERANCE);
        }
        let kept_ids: Vec<u64> = kept.iter().map(|candidate| candidate.id).collect();
        assert_eq!(kept_ids, [1, 3]);
    }

    #[test]
    fn aspect_tolerance_is_strict() {
        // 1.85 is inside the tolerance band, 1.90 is outside.
        assert_eq!(suitable(vec![candidate(1, 1850, 1000, "jpg")]).len(), 1);
        assert!(suitable(vec![candidate(2, 1900, 1000, "jpg")]).is_empty());
    }

    #[test]
    fn extension_comparison_ignores_case() {
        let mut entry = candidate(1, 1920, 1080, "jpg");
        entry.file_ext = Some("JPG".to_string());
        assert_eq!(suitable(vec![entry]).len(), 1);
    }

    #[test]
    fn pick_is_empty_safe_and_deterministic_with_a_seed() {
        let mut rng = ChaChaRng::seed_from_u64(7);
        assert!(pick(&[], &mut rng).is_none());

        let only = vec![candidate(1, 1920, 1080, "jpg")];
        assert_eq!(pick(&only, &mut rng).unwrap().id, 1);

        let many = vec![
            candidate(1, 1920, 1080, "jpg"),
            candidate(2, 1920, 1080, "jpg"),
            candidate(3, 1920, 1080, "jpg"),
        ];
        let mut first = ChaChaRng::seed_from_u64(7);
        let mut second = ChaChaRng::seed_from_u64(7);
        assert_eq!(
            pick(&many, &mut first).unwrap().id,
            pick(&many, &mut second).unwrap().id
        );
    }
}
