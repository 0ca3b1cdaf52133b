//! Keyword cues extracted from free text
//!
//! All matching runs on folded text: lowercase, accents removed, punctuation
//! turned into spaces, padded with one space on each side so that phrases can
//! be matched on word boundaries.

use crate::session::{DeviceKind, Locale, OperatingSystem, SkillLevel};

const MAX_NAME_CHARS: usize = 40;
const MAX_NAME_WORDS: usize = 3;

pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars().flat_map(char::to_lowercase) {
        let c = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        };
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

/// True if any phrase occurs in `folded` on word boundaries
pub fn has_any(folded: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| folded.contains(&format!(" {p} ")))
}

const DEVICE_CUES: [(DeviceKind, &[&str]); 8] = [
    (DeviceKind::Notebook, &["notebook", "laptop", "portatil", "netbook", "macbook"]),
    (DeviceKind::Desktop, &["desktop", "escritorio", "pc de escritorio", "gabinete", "torre", "all in one", "imac"]),
    (DeviceKind::Phone, &["phone", "celular", "movil", "telefono", "smartphone", "iphone", "android"]),
    (DeviceKind::Tablet, &["tablet", "ipad"]),
    (DeviceKind::TvStreaming, &["smart tv", "tv", "tele", "televisor", "chromecast", "fire stick", "roku", "stick tv"]),
    (DeviceKind::Router, &["router", "modem", "repetidor", "access point"]),
    (DeviceKind::Printer, &["printer", "impresora", "multifuncion", "scanner", "escaner"]),
    (DeviceKind::Other, &["other device", "otro", "otro dispositivo", "other"]),
];

/// Device mentioned in the text. Generic words like "computer" are ambiguous
/// and deliberately not matched.
pub fn detect_device(text: &str) -> Option<DeviceKind> {
    let folded = fold(text);
    DEVICE_CUES
        .iter()
        .find(|(_, cues)| has_any(&folded, cues))
        .map(|(kind, _)| *kind)
}

/// Device detection for free text outside the device question, where "other"
/// is just a word
pub fn mentions_specific_device(text: &str) -> Option<DeviceKind> {
    detect_device(text).filter(|d| *d != DeviceKind::Other)
}

pub fn detect_os(text: &str) -> Option<OperatingSystem> {
    const OS_CUES: [(OperatingSystem, &[&str]); 6] = [
        (OperatingSystem::Windows, &["windows", "win10", "win11", "win 10", "win 11"]),
        (OperatingSystem::MacOs, &["mac", "macos", "osx", "macbook", "imac"]),
        (OperatingSystem::Linux, &["linux", "ubuntu", "debian", "fedora", "mint"]),
        (OperatingSystem::Android, &["android", "samsung", "motorola", "xiaomi"]),
        (OperatingSystem::Ios, &["ios", "iphone", "ipad"]),
        (OperatingSystem::ChromeOs, &["chromebook", "chromeos", "chrome os"]),
    ];
    let folded = fold(text);
    OS_CUES
        .iter()
        .find(|(_, cues)| has_any(&folded, cues))
        .map(|(os, _)| *os)
}

/// Skill level suggested by vocabulary, if any
pub fn infer_skill(text: &str) -> Option<SkillLevel> {
    let folded = fold(text);
    if has_any(
        &folded,
        &[
            "no se nada", "no entiendo", "no se como", "que es", "soy nuevo", "soy nueva",
            "no soy bueno", "no se de tecnologia", "dont know", "don t know", "what is",
            "not good with", "not techy", "beginner", "no idea",
        ],
    ) {
        return Some(SkillLevel::Beginner);
    }
    if has_any(
        &folded,
        &[
            "dns", "dhcp", "ip", "bios", "uefi", "driver", "drivers", "controlador", "firmware",
            "ping", "terminal", "cmd", "powershell", "registry", "registro de windows",
            "safe mode", "modo seguro", "kernel", "subnet", "gateway",
        ],
    ) {
        return Some(SkillLevel::Advanced);
    }
    None
}

pub fn is_frustrated(text: &str) -> bool {
    let folded = fold(text);
    has_any(
        &folded,
        &[
            "harto", "harta", "podrido", "podrida", "me cans", "me canse", "una porqueria",
            "no sirve para nada", "inutil", "estoy enojado", "estoy enojada", "que bronca",
            "fed up", "useless", "this is ridiculous", "so annoying", "i m angry", "im angry",
            "frustrated", "frustrado", "frustrada", "sick of",
        ],
    )
}

/// Explicit request for a human
pub fn wants_human(text: &str) -> bool {
    let folded = fold(text);
    has_any(
        &folded,
        &[
            "tecnico", "tecnica", "humano", "persona real", "operador", "operadora",
            "hablar con alguien", "derivame", "derivar", "soporte humano", "technician",
            "human", "real person", "agent", "talk to someone", "escalate",
        ],
    )
}

pub fn is_question(text: &str) -> bool {
    text.trim_end().ends_with('?')
}

pub fn asks_for_explanation(text: &str) -> bool {
    let folded = fold(text);
    has_any(
        &folded,
        &[
            "explicame", "explicar", "como hago", "como se hace", "no entiendo", "no entendi",
            "explain", "how do i", "i don t understand", "dont understand",
        ],
    )
}

pub fn says_worked(text: &str) -> bool {
    let folded = fold(text);
    has_any(
        &folded,
        &[
            "funciono", "ya funciona", "anda", "ya anda", "solucionado", "se soluciono",
            "resuelto", "listo", "it worked", "works now", "fixed", "solved", "working now",
        ],
    )
}

pub fn says_still_broken(text: &str) -> bool {
    let folded = fold(text);
    has_any(
        &folded,
        &[
            "sigue igual", "no funciono", "no funciona", "no anda", "sigue sin", "nada",
            "todavia no", "still broken", "didn t work", "didnt work", "still not", "no luck",
            "same problem", "not working",
        ],
    )
}

pub fn parse_language(text: &str) -> Option<Locale> {
    let folded = fold(text);
    if has_any(&folded, &["english", "ingles"]) {
        Some(Locale::En)
    } else if has_any(&folded, &["espana", "spain", "es es"]) {
        Some(Locale::EsEs)
    } else if has_any(&folded, &["espanol", "spanish", "castellano", "argentina", "es ar"]) {
        Some(Locale::EsAr)
    } else {
        None
    }
}

/// Pull a plausible display name out of a reply to "what's your name?"
pub fn extract_name(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let prefixes = [
        "me llamo ", "mi nombre es ", "soy ", "my name is ", "i am ", "i'm ", "im ", "call me ",
    ];
    let rest = prefixes
        .iter()
        .find_map(|p| lower.strip_prefix(p).map(|r| r.chars().count()))
        .map_or(trimmed, |remaining| {
            let skip = trimmed.chars().count() - remaining;
            trimmed
                .char_indices()
                .nth(skip)
                .map_or("", |(idx, _)| trimmed.split_at(idx).1)
        });

    let words: Vec<String> = rest
        .split_whitespace()
        .take(MAX_NAME_WORDS)
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_string())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty()
        || words
            .iter()
            .any(|w| !w.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-'))
    {
        return None;
    }

    let name = words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ");
    (name.chars().count() <= MAX_NAME_CHARS).then_some(name)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
