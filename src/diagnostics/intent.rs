//! Keyword intent classification

use crate::normalizer::cues::{fold, has_any};
use serde::{Deserialize, Serialize};

/// Coarse problem category used to key the fallback table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    NoPower,
    NoNetwork,
    SlowPerformance,
    Display,
    Audio,
    Peripheral,
    AppInstall,
    Account,
    Generic,
}

/// First match wins, so more specific categories come first
const INTENT_CUES: [(Intent, &[&str]); 8] = [
    (
        Intent::NoPower,
        &[
            "no enciende", "no prende", "no arranca", "no carga", "no inicia", "no da senales",
            "se apaga sola", "se apaga solo", "sin energia", "won t turn on", "wont turn on",
            "doesn t turn on", "does not turn on", "not turning on", "no power", "won t start",
            "won t boot", "dead", "won t charge", "not charging",
        ],
    ),
    (
        Intent::NoNetwork,
        &[
            "internet", "wifi", "wi fi", "sin conexion", "no conecta", "no se conecta", "red",
            "senal", "network", "no connection", "can t connect", "offline", "ethernet",
        ],
    ),
    (
        Intent::Display,
        &[
            "pantalla", "monitor", "no da imagen", "sin imagen", "pantalla negra", "pantalla azul",
            "parpadea", "screen", "display", "no picture", "black screen", "blue screen", "flicker",
        ],
    ),
    (
        Intent::Audio,
        &[
            "sonido", "audio", "no se escucha", "parlante", "parlantes", "auriculares", "microfono",
            "sound", "speaker", "speakers", "headphones", "microphone", "no sound",
        ],
    ),
    (
        Intent::Peripheral,
        &[
            "impresora", "imprime", "mouse", "teclado", "usb", "bluetooth", "escaner", "camara web",
            "webcam", "printer", "print", "keyboard", "scanner",
        ],
    ),
    (
        Intent::Account,
        &[
            "contrasena", "clave", "usuario", "cuenta", "sesion", "iniciar sesion", "login",
            "password", "account", "sign in", "log in", "locked out", "two factor", "2fa",
        ],
    ),
    (
        Intent::AppInstall,
        &[
            "instalar", "instalo", "instalacion", "descargar", "configurar", "programa", "aplicacion",
            "install", "download", "set up", "setup", "configure", "app",
        ],
    ),
    (
        Intent::SlowPerformance,
        &[
            "lenta", "lento", "lentitud", "se traba", "se cuelga", "tarda", "congela", "slow",
            "freezes", "freezing", "hangs", "lag", "laggy", "sluggish",
        ],
    ),
];

impl Intent {
    pub fn classify(text: &str) -> Intent {
        let folded = fold(text);
        INTENT_CUES
            .iter()
            .find(|(_, cues)| has_any(&folded, cues))
            .map_or(Intent::Generic, |(intent, _)| *intent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::NoPower => "no_power",
            Intent::NoNetwork => "no_network",
            Intent::SlowPerformance => "slow_performance",
            Intent::Display => "display",
            Intent::Audio => "audio",
            Intent::Peripheral => "peripheral",
            Intent::AppInstall => "app_install",
            Intent::Account => "account",
            Intent::Generic => "generic",
        }
    }
}
