//! Package version ordering
//!
//! Debian and Alpine order versions differently, so each driver has its own
//! comparator:
//!
//! - [`compare`]: dpkg rules (`[epoch:]upstream[-revision]`, `~` sorting
//!   before everything, even the end of the string)
//! - [`compare_apk`]: apk rules (`1.2.3a_rc1-r0`, where `_alpha`, `_beta`,
//!   `_pre` and `_rc` sort below the bare release)

use std::cmp::Ordering;

/// Compare two dpkg version strings
pub fn compare(a: &str, b: &str) -> Ordering {
    let (ea, ua, ra) = split(a);
    let (eb, ub, rb) = split(b);
    ea.cmp(&eb)
        .then_with(|| compare_part(ua, ub))
        .then_with(|| compare_part(ra, rb))
}

fn split(v: &str) -> (u64, &str, &str) {
    let (epoch, rest) = match v.split_once(':') {
        Some((e, rest)) if !e.is_empty() && e.bytes().all(|c| c.is_ascii_digit()) => {
            (e.parse().unwrap_or(0), rest)
        }
        _ => (0, v),
    };
    match rest.rsplit_once('-') {
        Some((upstream, revision)) => (epoch, upstream, revision),
        None => (epoch, rest, ""),
    }
}

/// Weight of a non-digit character
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

fn compare_part(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit prefix
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ca = a.get(i).copied().filter(|c| !c.is_ascii_digit());
            let cb = b.get(j).copied().filter(|c| !c.is_ascii_digit());
            let diff = order(ca) - order(cb);
            if diff != 0 {
                return diff.cmp(&0);
            }
            if ca.is_some() {
                i += 1;
            }
            if cb.is_some() {
                j += 1;
            }
        }

        // Numeric run, compared without leading zeros
        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }
        let si = i;
        let sj = j;
        while i < a.len() && a[i].is_ascii_digit() {
            i += 1;
        }
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        let ord = compare_digits(&a[si..i], &b[sj..j]);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Compare two runs of ASCII digits without leading zeros
fn compare_digits(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Suffix ranks relative to a bare release (0)
const APK_SUFFIXES: &[(&str, i8)] = &[
    ("alpha", -4),
    ("beta", -3),
    ("pre", -2),
    ("rc", -1),
    ("cvs", 1),
    ("svn", 2),
    ("git", 3),
    ("hg", 4),
    ("p", 5),
];

/// A parsed apk version
#[derive(Debug)]
struct ApkVersion<'a> {
    numbers: Vec<&'a str>,
    letter: Option<u8>,
    suffixes: Vec<(i8, &'a str)>,
    revision: &'a str,
}

impl<'a> ApkVersion<'a> {
    fn parse(v: &'a str) -> Option<Self> {
        let (body, revision) = match v.rsplit_once("-r") {
            Some((body, rev)) if !rev.is_empty() && rev.bytes().all(|c| c.is_ascii_digit()) => {
                (body, rev)
            }
            _ => (v, ""),
        };
        let (release, suffixes) = match body.split_once('_') {
            Some((release, rest)) => (release, Some(rest)),
            None => (body, None),
        };

        let (release, letter) = match release.as_bytes().last() {
            Some(c) if c.is_ascii_lowercase() => (&release[..release.len() - 1], Some(*c)),
            _ => (release, None),
        };
        let numbers: Vec<&str> = release.split('.').collect();
        if numbers
            .iter()
            .any(|n| n.is_empty() || !n.bytes().all(|c| c.is_ascii_digit()))
        {
            return None;
        }

        let mut parsed = Vec::new();
        for suffix in suffixes.into_iter().flat_map(|s| s.split('_')) {
            let digits = suffix.trim_start_matches(|c: char| c.is_ascii_lowercase());
            let name = &suffix[..suffix.len() - digits.len()];
            if !digits.bytes().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let (_, rank) = APK_SUFFIXES.iter().find(|(n, _)| *n == name)?;
            parsed.push((*rank, digits));
        }

        Some(Self {
            numbers,
            letter,
            suffixes: parsed,
            revision,
        })
    }
}

fn strip_zeros(s: &str) -> &[u8] {
    s.trim_start_matches('0').as_bytes()
}

impl Ord for ApkVersion<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        for pair in self.numbers.iter().zip(&other.numbers) {
            let ord = compare_digits(strip_zeros(pair.0), strip_zeros(pair.1));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        let ord = self.numbers.len().cmp(&other.numbers.len());
        if ord != Ordering::Equal {
            return ord;
        }
        let ord = self.letter.cmp(&other.letter);
        if ord != Ordering::Equal {
            return ord;
        }

        // A missing suffix ranks as a bare release
        let len = self.suffixes.len().max(other.suffixes.len());
        for i in 0..len {
            let (ra, na) = self.suffixes.get(i).copied().unwrap_or((0, ""));
            let (rb, nb) = other.suffixes.get(i).copied().unwrap_or((0, ""));
            let ord = ra
                .cmp(&rb)
                .then_with(|| compare_digits(strip_zeros(na), strip_zeros(nb)));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_digits(strip_zeros(self.revision), strip_zeros(other.revision))
    }
}

impl PartialEq for ApkVersion<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ApkVersion<'_> {}

impl PartialOrd for ApkVersion<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two apk version strings. Unparseable versions sort below
/// valid ones and compare bytewise among themselves.
pub fn compare_apk(a: &str, b: &str) -> Ordering {
    match (ApkVersion::parse(a), ApkVersion::parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
