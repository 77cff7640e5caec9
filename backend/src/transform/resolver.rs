//! Column Resolver: fuzzy header lookup for drifting survey exports.
//!
//! Survey tools reword their columns between phases (capitalization,
//! trailing qualifiers, Turkish letters typed as ASCII), so semantic fields
//! are located by similarity instead of exact names.
//!
//! # Algorithm
//!
//! 1. Normalize target and headers: fold the six Turkish letters to Latin,
//!    lowercase, strip combining marks (NFKD), collapse whitespace, trim.
//! 2. Remove all spaces (compact form).
//! 3. Score each header's compact form against the target's with the
//!    Ratcliff/Obershelp ratio `2 * M / (|header| + |target|)`; keep the
//!    best, first header wins ties.
//! 4. Accept it only at or above [`SIMILARITY_CUTOFF`] and return the
//!    original header text.
//!
//! ```rust,ignore
//! use pivotload::transform::resolver::resolve;
//!
//! let headers = vec!["Bağlantı Türü".to_string(), "Cihaz".to_string()];
//! assert_eq!(resolve("baglanti turu", &headers), Some("Bağlantı Türü"));
//! ```

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum similarity for a header to resolve.
pub const SIMILARITY_CUTOFF: f64 = 0.70;

/// Normalize free text for comparison.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .chars()
        .map(|c| match c {
            'ı' | 'İ' => 'i',
            'ş' | 'Ş' => 's',
            'ğ' | 'Ğ' => 'g',
            'ü' | 'Ü' => 'u',
            'ö' | 'Ö' => 'o',
            'ç' | 'Ç' => 'c',
            other => other,
        })
        .collect();

    let stripped: String = folded
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized form with every space removed.
pub fn compact(s: &str) -> String {
    normalize(s).replace(' ', "")
}

/// Similarity ratio (0.0..=1.0) of two compact strings.
///
/// `M` counts the characters of the longest common block plus, recursively,
/// the matches left and right of it. Two empty strings score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, size) = longest_block(a, b);
    if size == 0 {
        return 0;
    }
    size + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + size..], &b[j + size..])
}

/// Longest common block as `(start in a, start in b, len)`. Ties go to the
/// block starting earliest in `a`, then in `b`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // run[j + 1]: length of the common run ending at a[i], b[j]
    let mut previous = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut run = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = previous[j] + 1;
                run[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        previous = run;
    }
    best
}

/// Header set with precomputed compact forms, reused for many lookups
/// against the same sheet.
#[derive(Debug, Clone)]
pub struct ColumnResolver<'h> {
    headers: &'h [String],
    compact: Vec<String>,
}

impl<'h> ColumnResolver<'h> {
    pub fn new(headers: &'h [String]) -> Self {
        Self {
            headers,
            compact: headers.iter().map(|h| compact(h)).collect(),
        }
    }

    pub fn headers(&self) -> &'h [String] {
        self.headers
    }

    /// Best header for `target`, or `None` below the cutoff.
    pub fn resolve(&self, target: &str) -> Option<&'h str> {
        self.resolve_excluding(target, &[])
    }

    /// Like [`ColumnResolver::resolve`], ignoring headers in `exclude`.
    pub fn resolve_excluding(&self, target: &str, exclude: &[&str]) -> Option<&'h str> {
        self.resolve_scored(target, exclude).map(|(h, _)| h)
    }

    /// Best header and its similarity.
    pub fn resolve_scored(&self, target: &str, exclude: &[&str]) -> Option<(&'h str, f64)> {
        self.best_match(target, exclude)
            .map(|(i, score)| (self.headers[i].as_str(), score))
    }

    /// Column position of the best header. Unlike the name, the position
    /// stays unambiguous when header texts repeat.
    pub fn resolve_position(&self, target: &str, exclude: &[&str]) -> Option<usize> {
        self.best_match(target, exclude).map(|(i, _)| i)
    }

    fn best_match(&self, target: &str, exclude: &[&str]) -> Option<(usize, f64)> {
        let needle = compact(target);
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in self.compact.iter().enumerate() {
            if candidate.is_empty() || exclude.contains(&self.headers[i].as_str()) {
                continue;
            }
            let score = similarity(candidate, &needle);
            if score >= SIMILARITY_CUTOFF && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best
    }

    /// First phrasing in `candidates` that resolves.
    pub fn resolve_any<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&'h str> {
        self.resolve_any_excluding(candidates, &[])
    }

    pub fn resolve_any_excluding<S: AsRef<str>>(
        &self,
        candidates: &[S],
        exclude: &[&str],
    ) -> Option<&'h str> {
        self.resolve_any_scored(candidates, exclude).map(|(h, _)| h)
    }

    fn resolve_any_scored<S: AsRef<str>>(
        &self,
        candidates: &[S],
        exclude: &[&str],
    ) -> Option<(&'h str, f64)> {
        candidates
            .iter()
            .find_map(|c| self.resolve_scored(c.as_ref(), exclude))
    }

    /// Resolve several fields at once, each header going to at most one
    /// field. The closest remaining (field, header) pair is fixed first,
    /// the earlier field on a tie, until nothing else resolves.
    pub fn resolve_unique<S: AsRef<str>>(&self, fields: &[&[S]]) -> Vec<Option<&'h str>> {
        let mut assigned: Vec<Option<&'h str>> = vec![None; fields.len()];
        let mut claimed: Vec<&'h str> = Vec::new();

        loop {
            let mut winner: Option<(usize, &'h str, f64)> = None;
            for (i, phrasings) in fields.iter().enumerate() {
                if assigned[i].is_some() {
                    continue;
                }
                if let Some((header, score)) = self.resolve_any_scored(phrasings, &claimed) {
                    if winner.map_or(true, |(_, _, best)| score > best) {
                        winner = Some((i, header, score));
                    }
                }
            }

            match winner {
                Some((i, header, _)) => {
                    assigned[i] = Some(header);
                    claimed.push(header);
                }
                None => return assigned,
            }
        }
    }

    /// Two fields that may not share a header ("Cihaz" vs "Cihaz OS").
    pub fn resolve_distinct<S: AsRef<str>>(
        &self,
        first: &[S],
        second: &[S],
    ) -> (Option<&'h str>, Option<&'h str>) {
        let found = self.resolve_unique(&[first, second]);
        (found[0], found[1])
    }
}

/// Resolve one semantic name against a header list.
pub fn resolve<'h>(target: &str, headers: &'h [String]) -> Option<&'h str> {
    ColumnResolver::new(headers).resolve(target)
}

/// Resolve the first of several phrasings against a header list.
pub fn resolve_any<'h, S: AsRef<str>>(candidates: &[S], headers: &'h [String]) -> Option<&'h str> {
    ColumnResolver::new(headers).resolve_any(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_turkish_letters() {
        assert_eq!(normalize("  Bağlantı   TÜRÜ "), "baglanti turu");
        assert_eq!(normalize("İŞLETİM Sistemi"), "isletim sistemi");
        assert_eq!(normalize("Çoğu Öğe"), "cogu oge");
        assert_eq!(normalize("Café"), "cafe");
    }

    #[test]
    fn test_compact_removes_spaces() {
        assert_eq!(compact("Cihaz  OS"), "cihazos");
    }

    #[test]
    fn test_resolves_case_space_and_diacritic_variants() {
        let h = headers(&["Zaman damgası", "BAGLANTI  turu", "Cihaz"]);
        assert_eq!(resolve("Bağlantı türü", &h), Some("BAGLANTI  turu"));
        assert_eq!(resolve("zaman Damgasi", &h), Some("Zaman damgası"));
        assert_eq!(resolve("cihaz", &h), Some("Cihaz"));
    }

    #[test]
    fn test_tolerates_trailing_qualifiers() {
        let h = headers(&["Bip Uygulama Versiyonu", "Whatsapp Uygulama Versiyonu"]);
        assert_eq!(
            resolve("Bip Uygulama Versiyon", &h),
            Some("Bip Uygulama Versiyonu")
        );
    }

    #[test]
    fn test_dissimilar_header_never_resolves() {
        let h = headers(&["Katılımcı", "Tarih"]);
        assert!(similarity(&compact("Network"), &compact("Katılımcı")) < SIMILARITY_CUTOFF);
        assert_eq!(resolve("Network", &h), None);
        assert_eq!(resolve("", &h), None);
        assert_eq!(resolve("Network", &[]), None);
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("os", "os:"), 0.8);
        assert_eq!(similarity("cihaz", "cihazos"), 10.0 / 12.0);
        // "bcd" matches, the leftover "a" on opposite ends does not
        assert_eq!(similarity("abcd", "bcda"), 0.75);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("ab", ""), 0.0);
    }

    #[test]
    fn test_short_headers_resolve() {
        let h = headers(&["OS:", "Ad Soyad"]);
        assert_eq!(resolve("OS", &h), Some("OS:"));
        assert_eq!(resolve_any(&["Cihaz OS", "OS"], &h), Some("OS:"));
    }

    #[test]
    fn test_resolve_position_with_repeated_headers() {
        let h = headers(&["Bip Txt Puan", "Yorum", "Bip Call Puan", "Yorum"]);
        let resolver = ColumnResolver::new(&h);
        assert_eq!(resolver.resolve_position("yorum", &[]), Some(1));
        assert_eq!(resolver.resolve_position("Bip Call Puan", &[]), Some(2));
        assert_eq!(resolver.resolve_position("Network", &[]), None);
    }

    #[test]
    fn test_best_match_wins() {
        let h = headers(&["Cihaz OS", "Cihaz"]);
        assert_eq!(resolve("Cihaz", &h), Some("Cihaz"));
        assert_eq!(resolve("Cihaz OS", &h), Some("Cihaz OS"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let h = headers(&["Bip Txt Puan", "Bip Txt Yorum", "Bağlantı türü"]);
        let first = resolve("baglanti turu", &h);
        for _ in 0..10 {
            assert_eq!(resolve("baglanti turu", &h), first);
        }
    }

    #[test]
    fn test_resolve_any_takes_first_phrasing_that_hits() {
        let h = headers(&["Network", "wifi/lte"]);
        assert_eq!(
            resolve_any(&["Bağlantı türü", "Network", "wifi/lte"], &h),
            Some("Network")
        );
        assert_eq!(resolve_any(&["Bağlantı türü"], &h), None);
    }

    #[test]
    fn test_exclusion() {
        let h = headers(&["Cihaz OS", "Marka"]);
        let resolver = ColumnResolver::new(&h);
        assert_eq!(resolver.resolve("Cihaz"), Some("Cihaz OS"));
        assert_eq!(resolver.resolve_excluding("Cihaz", &["Cihaz OS"]), None);
    }

    #[test]
    fn test_distinct_fields_do_not_share_a_header() {
        let os = ["Cihaz OS", "OS"];
        let device = ["Cihaz"];

        let only_device = headers(&["Ad Soyad", "Cihaz"]);
        let r = ColumnResolver::new(&only_device);
        assert_eq!(r.resolve_distinct(&os, &device), (None, Some("Cihaz")));

        let only_os = headers(&["Cihaz OS"]);
        let r = ColumnResolver::new(&only_os);
        assert_eq!(r.resolve_distinct(&os, &device), (Some("Cihaz OS"), None));

        let both = headers(&["Cihaz", "Cihaz OS"]);
        let r = ColumnResolver::new(&both);
        assert_eq!(
            r.resolve_distinct(&os, &device),
            (Some("Cihaz OS"), Some("Cihaz"))
        );
    }
}
