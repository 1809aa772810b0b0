// Scale name -> pitch-class intervals above the track root.

pub const DEFAULT_SCALE: &str = "darktech";

const SCALES: &[(&str, &[i32])] = &[
    ("darktech", &[0, 3, 5, 6, 10]),
    ("phrygian", &[0, 1, 3, 5, 7, 8, 10]),
    ("minor", &[0, 2, 3, 5, 7, 8, 10]),
    ("harmonic_minor", &[0, 2, 3, 5, 7, 8, 11]),
    ("locrian", &[0, 1, 3, 5, 6, 8, 10]),
    ("minor_pentatonic", &[0, 3, 5, 7, 10]),
    ("hungarian_minor", &[0, 2, 3, 6, 7, 8, 11]),
    ("chromatic", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]),
];

/// Intervals for `name`, falling back to darktech for anything we don't know.
pub fn intervals(name: &str) -> &'static [i32] {
    lookup(name).unwrap_or_else(|| lookup(DEFAULT_SCALE).unwrap_or(&[0]))
}

pub fn lookup(name: &str) -> Option<&'static [i32]> {
    let name = name.trim();
    SCALES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, iv)| *iv)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    SCALES.iter().map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_scales_resolve() {
        assert_eq!(intervals("phrygian"), &[0, 1, 3, 5, 7, 8, 10]);
        assert_eq!(intervals("DarkTech"), &[0, 3, 5, 6, 10]);
    }

    #[test]
    fn unknown_scale_falls_back_to_darktech() {
        assert!(lookup("lydian dominant").is_none());
        assert_eq!(intervals("lydian dominant"), intervals(DEFAULT_SCALE));
    }

    #[test]
    fn every_scale_starts_on_the_root() {
        for name in names() {
            let iv = intervals(name);
            assert_eq!(iv[0], 0, "{name}");
            assert!(iv.windows(2).all(|w| w[0] < w[1]), "{name} not ascending");
        }
    }
}
