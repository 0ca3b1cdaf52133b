//! User-facing strings
//!
//! Every reply the core can produce is looked up here so that no handler can
//! end up with an empty or untranslated string.

use crate::session::{DeviceKind, Locale};

struct Localized {
    es_ar: &'static str,
    es_es: &'static str,
    en: &'static str,
}

const fn l(es_ar: &'static str, es_es: &'static str, en: &'static str) -> Localized {
    Localized { es_ar, es_es, en }
}

/// Message keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Greeting,
    LanguageReprompt,
    AskName,
    NameReprompt,
    AskNeed,
    NeedReprompt,
    AskProblem,
    AskTask,
    ProblemReprompt,
    AskDevice,
    DeviceReprompt,
    StepPrefix,
    BeginnerHint,
    LoopReprompt,
    ExplainFallback,
    GoBackNothing,
    AskFeedback,
    FeedbackReprompt,
    FeedbackThanks,
    EscalationIntro,
    EscalationReprompt,
    TicketDelivered,
    TicketDeliveryFailed,
    TicketCreatedReprompt,
    Goodbye,
    EndedReprompt,
    FreeQaPrompt,
    FreeQaFallback,
    FreeQaFollowUp,
    Deescalation,
    DeescalationReprompt,
    Resume,
    Busy,
    EmptyReplyFallback,
    UnrecognizedButton,
    NothingReceived,
    ImageReceived,
    NoStepsLeft,
    ReasonUserRequested,
    ReasonRepeatedFailure,
    ReasonStepCeiling,
    ReasonNoStepsAvailable,
    // Button labels
    LabelNoName,
    LabelProblem,
    LabelTask,
    LabelQuestion,
    LabelWorked,
    LabelStillBroken,
    LabelExplain,
    LabelBack,
    LabelSkipContact,
    LabelFeedbackGood,
    LabelFeedbackBad,
    LabelResume,
    LabelRestart,
    LabelEnd,
}

impl Msg {
    #[allow(clippy::too_many_lines)] // One arm per message, by nature
    fn localized(self) -> Localized {
        match self {
            Msg::Greeting => l(
                "¡Hola! Soy el asistente de soporte técnico. Elegí tu idioma para empezar.",
                "¡Hola! Soy el asistente de soporte técnico. Elige tu idioma para empezar.",
                "Hi! I'm the technical support assistant. Pick your language to get started.",
            ),
            Msg::LanguageReprompt => l(
                "Para seguir necesito que elijas un idioma con los botones.",
                "Para continuar necesito que elijas un idioma con los botones.",
                "To continue, please choose a language using the buttons.",
            ),
            Msg::AskName => l(
                "¡Genial! ¿Cómo te llamás?",
                "¡Genial! ¿Cómo te llamas?",
                "Great! What's your name?",
            ),
            Msg::NameReprompt => l(
                "No llegué a entender tu nombre. Escribilo de nuevo o tocá \"Prefiero no decirlo\".",
                "No he entendido tu nombre. Escríbelo de nuevo o pulsa \"Prefiero no decirlo\".",
                "I didn't catch your name. Type it again or tap \"I'd rather not say\".",
            ),
            Msg::AskNeed => l(
                "¿En qué te puedo ayudar hoy?",
                "¿En qué te puedo ayudar hoy?",
                "How can I help you today?",
            ),
            Msg::NeedReprompt => l(
                "Elegí una de las opciones: tenés un problema, querés hacer una tarea o tenés una consulta.",
                "Elige una de las opciones: tienes un problema, quieres hacer una tarea o tienes una consulta.",
                "Please pick one of the options: a problem, a task, or a question.",
            ),
            Msg::AskProblem => l(
                "Contame qué problema tenés, con tus palabras.",
                "Cuéntame qué problema tienes, con tus palabras.",
                "Tell me about the problem in your own words.",
            ),
            Msg::AskTask => l(
                "Contame qué querés hacer y te guío paso a paso.",
                "Cuéntame qué quieres hacer y te guío paso a paso.",
                "Tell me what you want to do and I'll guide you step by step.",
            ),
            Msg::ProblemReprompt => l(
                "Necesito un poco más de detalle. ¿Qué está pasando exactamente?",
                "Necesito un poco más de detalle. ¿Qué está pasando exactamente?",
                "I need a bit more detail. What exactly is happening?",
            ),
            Msg::AskDevice => l(
                "¿En qué equipo te pasa? Elegí una opción o escribí el modelo.",
                "¿En qué equipo te ocurre? Elige una opción o escribe el modelo.",
                "Which device is it? Pick an option or type the model.",
            ),
            Msg::DeviceReprompt => l(
                "No reconocí el equipo. Elegí una de las opciones.",
                "No he reconocido el equipo. Elige una de las opciones.",
                "I didn't recognise that device. Please pick one of the options.",
            ),
            Msg::StepPrefix => l("Paso", "Paso", "Step"),
            Msg::BeginnerHint => l(
                "Tomate tu tiempo; si algo no se entiende, tocá \"Explicar este paso\".",
                "Tómate tu tiempo; si algo no se entiende, pulsa \"Explicar este paso\".",
                "Take your time; if anything is unclear, tap \"Explain this step\".",
            ),
            Msg::LoopReprompt => l(
                "Contame cómo te fue con el paso usando los botones.",
                "Cuéntame cómo te ha ido con el paso usando los botones.",
                "Let me know how the step went using the buttons.",
            ),
            Msg::ExplainFallback => l(
                "Te lo explico mejor: hacé el paso despacio, de a una acción por vez, y fijate si cambia algo en el equipo (luces, sonidos o mensajes).",
                "Te lo explico mejor: haz el paso despacio, una acción cada vez, y fíjate si cambia algo en el equipo (luces, sonidos o mensajes).",
                "Here it is in more detail: do the step slowly, one action at a time, and watch for any change on the device (lights, sounds or messages).",
            ),
            Msg::GoBackNothing => l(
                "Este es el primer paso, no hay uno anterior.",
                "Este es el primer paso, no hay uno anterior.",
                "This is the first step; there is no previous one.",
            ),
            Msg::AskFeedback => l(
                "¡Excelente, me alegra que se haya solucionado! ¿Cómo fue tu experiencia?",
                "¡Excelente, me alegra que se haya solucionado! ¿Qué tal ha sido tu experiencia?",
                "Excellent, glad it's fixed! How was your experience?",
            ),
            Msg::FeedbackReprompt => l(
                "¿Me contás cómo fue tu experiencia? Podés usar los botones o escribir un comentario.",
                "¿Me cuentas qué tal ha sido tu experiencia? Puedes usar los botones o escribir un comentario.",
                "Could you rate your experience? Use the buttons or write a comment.",
            ),
            Msg::FeedbackThanks => l(
                "¡Gracias por tu opinión! Si necesitás algo más, acá estoy.",
                "¡Gracias por tu opinión! Si necesitas algo más, aquí estoy.",
                "Thanks for your feedback! I'm here if you need anything else.",
            ),
            Msg::EscalationIntro => l(
                "Voy a derivar tu caso a un técnico. Si querés, dejame un mail o teléfono de contacto; si no, tocá \"Omitir\".",
                "Voy a derivar tu caso a un técnico. Si quieres, déjame un correo o teléfono de contacto; si no, pulsa \"Omitir\".",
                "I'm handing your case to a technician. If you like, leave an email or phone number; otherwise tap \"Skip\".",
            ),
            Msg::EscalationReprompt => l(
                "Escribí un dato de contacto o tocá \"Omitir\" para continuar.",
                "Escribe un dato de contacto o pulsa \"Omitir\" para continuar.",
                "Type a contact detail or tap \"Skip\" to continue.",
            ),
            Msg::TicketDelivered => l(
                "Listo, un técnico va a revisar tu caso.",
                "Listo, un técnico revisará tu caso.",
                "Done, a technician will review your case.",
            ),
            Msg::TicketDeliveryFailed => l(
                "Tu ticket quedó registrado, pero no pude avisarle al equipo en este momento. Guardá el número de ticket.",
                "Tu ticket ha quedado registrado, pero no he podido avisar al equipo en este momento. Guarda el número de ticket.",
                "Your ticket is registered, but I couldn't notify the team right now. Please keep the ticket number.",
            ),
            Msg::TicketCreatedReprompt => l(
                "Tu caso ya está derivado. Tocá \"Finalizar\" para cerrar la conversación.",
                "Tu caso ya está derivado. Pulsa \"Finalizar\" para cerrar la conversación.",
                "Your case has been handed over. Tap \"End chat\" to close the conversation.",
            ),
            Msg::Goodbye => l(
                "¡Gracias por escribir! Que tengas un buen día.",
                "¡Gracias por escribir! Que tengas un buen día.",
                "Thanks for reaching out! Have a great day.",
            ),
            Msg::EndedReprompt => l(
                "La conversación terminó. Tocá \"Empezar de nuevo\" si necesitás otra ayuda.",
                "La conversación ha terminado. Pulsa \"Empezar de nuevo\" si necesitas otra ayuda.",
                "This conversation has ended. Tap \"Start over\" if you need more help.",
            ),
            Msg::FreeQaPrompt => l(
                "Dale, hacé tu consulta.",
                "Adelante, haz tu consulta.",
                "Sure, go ahead and ask.",
            ),
            Msg::FreeQaFallback => l(
                "No tengo una respuesta precisa para eso ahora mismo. Si querés, seguimos con tu caso y lo vemos paso a paso.",
                "No tengo una respuesta precisa para eso ahora mismo. Si quieres, seguimos con tu caso y lo vemos paso a paso.",
                "I don't have a precise answer for that right now. If you like, we can continue with your case step by step.",
            ),
            Msg::FreeQaFollowUp => l(
                "¿Tenés otra consulta o seguimos?",
                "¿Tienes otra consulta o seguimos?",
                "Any other question, or shall we continue?",
            ),
            Msg::Deescalation => l(
                "Entiendo que es frustrante y lamento las molestias. Estoy para ayudarte; cuando quieras seguimos juntos.",
                "Entiendo que es frustrante y siento las molestias. Estoy para ayudarte; cuando quieras seguimos juntos.",
                "I understand this is frustrating and I'm sorry for the trouble. I'm here to help; we can continue whenever you're ready.",
            ),
            Msg::DeescalationReprompt => l(
                "Tocá \"Continuar\" cuando quieras retomar.",
                "Pulsa \"Continuar\" cuando quieras retomar.",
                "Tap \"Continue\" whenever you want to pick up again.",
            ),
            Msg::Resume => l("Retomemos.", "Retomemos.", "Let's pick up where we left off."),
            Msg::Busy => l(
                "Todavía estoy procesando tu mensaje anterior. Esperá un momento.",
                "Todavía estoy procesando tu mensaje anterior. Espera un momento.",
                "A previous message is still being processed. Please wait a moment.",
            ),
            Msg::EmptyReplyFallback => l(
                "Perdón, no pude generar una respuesta. ¿Podés intentar de nuevo?",
                "Perdona, no he podido generar una respuesta. ¿Puedes intentarlo de nuevo?",
                "Sorry, I couldn't produce a reply. Could you try again?",
            ),
            Msg::UnrecognizedButton => l(
                "Esa opción no está disponible.",
                "Esa opción no está disponible.",
                "That option isn't available.",
            ),
            Msg::NothingReceived => l(
                "No recibí ningún mensaje.",
                "No he recibido ningún mensaje.",
                "I didn't receive a message.",
            ),
            Msg::ImageReceived => l(
                "Recibí tu imagen.",
                "He recibido tu imagen.",
                "I got your image.",
            ),
            Msg::NoStepsLeft => l(
                "No tengo más pasos para sugerirte.",
                "No tengo más pasos para sugerirte.",
                "I have no more steps to suggest.",
            ),
            Msg::ReasonUserRequested => l(
                "pedido del usuario",
                "petición del usuario",
                "requested by the user",
            ),
            Msg::ReasonRepeatedFailure => l(
                "el problema persiste tras varios intentos",
                "el problema persiste tras varios intentos",
                "problem persists after repeated attempts",
            ),
            Msg::ReasonStepCeiling => l(
                "se alcanzó el máximo de pasos guiados",
                "se ha alcanzado el máximo de pasos guiados",
                "guided step limit reached",
            ),
            Msg::ReasonNoStepsAvailable => l(
                "no hay más pasos disponibles",
                "no hay más pasos disponibles",
                "no further steps available",
            ),
            Msg::LabelNoName => l("Prefiero no decirlo", "Prefiero no decirlo", "I'd rather not say"),
            Msg::LabelProblem => l("Tengo un problema", "Tengo un problema", "I have a problem"),
            Msg::LabelTask => l("Quiero hacer una tarea", "Quiero hacer una tarea", "I need to do a task"),
            Msg::LabelQuestion => l("Tengo una consulta", "Tengo una consulta", "I have a question"),
            Msg::LabelWorked => l("¡Funcionó!", "¡Ha funcionado!", "It worked!"),
            Msg::LabelStillBroken => l("Sigue igual", "Sigue igual", "Still broken"),
            Msg::LabelExplain => l("Explicar este paso", "Explicar este paso", "Explain this step"),
            Msg::LabelBack => l("Volver al paso anterior", "Volver al paso anterior", "Go back one step"),
            Msg::LabelSkipContact => l("Omitir", "Omitir", "Skip"),
            Msg::LabelFeedbackGood => l("👍 Buena", "👍 Buena", "👍 Good"),
            Msg::LabelFeedbackBad => l("👎 Mala", "👎 Mala", "👎 Bad"),
            Msg::LabelResume => l("Continuar", "Continuar", "Continue"),
            Msg::LabelRestart => l("Empezar de nuevo", "Empezar de nuevo", "Start over"),
            Msg::LabelEnd => l("Finalizar", "Finalizar", "End chat"),
        }
    }

    pub fn text(self, locale: Locale) -> &'static str {
        let localized = self.localized();
        match locale {
            Locale::EsAr => localized.es_ar,
            Locale::EsEs => localized.es_es,
            Locale::En => localized.en,
        }
    }
}

pub fn device_label(device: DeviceKind, locale: Locale) -> &'static str {
    let spanish = locale.is_spanish();
    match (device, spanish) {
        (DeviceKind::Desktop, true) => "PC de escritorio",
        (DeviceKind::Desktop, false) => "Desktop PC",
        (DeviceKind::Notebook, true) => "Notebook",
        (DeviceKind::Notebook, false) => "Laptop",
        (DeviceKind::Phone, true) => "Celular",
        (DeviceKind::Phone, false) => "Phone",
        (DeviceKind::Tablet, _) => "Tablet",
        (DeviceKind::TvStreaming, true) => "Smart TV / Stick TV",
        (DeviceKind::TvStreaming, false) => "Smart TV / streaming stick",
        (DeviceKind::Router, true) => "Router / Módem",
        (DeviceKind::Router, false) => "Router / Modem",
        (DeviceKind::Printer, true) => "Impresora",
        (DeviceKind::Printer, false) => "Printer",
        (DeviceKind::Other, true) => "Otro",
        (DeviceKind::Other, false) => "Other",
    }
}

/// Language names are shown in their own language
pub fn language_label(locale: Locale) -> &'static str {
    match locale {
        Locale::EsAr => "Español (Argentina)",
        Locale::EsEs => "Español (España)",
        Locale::En => "English",
    }
}

/// "Nice to meet you" line, personalised when a name is known
pub fn nice_to_meet(locale: Locale, name: Option<&str>) -> String {
    match (locale.is_spanish(), name) {
        (true, Some(name)) => format!("¡Encantado, {name}!"),
        (true, None) => "¡Perfecto!".to_string(),
        (false, Some(name)) => format!("Nice to meet you, {name}!"),
        (false, None) => "Perfect!".to_string(),
    }
}

pub fn ticket_line(locale: Locale, ticket_id: &str) -> String {
    if locale.is_spanish() {
        format!("Número de ticket: {ticket_id}")
    } else {
        format!("Ticket number: {ticket_id}")
    }
}
