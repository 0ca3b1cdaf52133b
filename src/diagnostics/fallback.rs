//! Deterministic step table
//!
//! Five basic and five advanced steps per intent, in Spanish and English.
//! Spanish steps use the infinitive so they read naturally in both es-AR and
//! es-ES. `Generic` supplements any intent whose own steps are used up.

use super::Intent;
use crate::session::{DiagnosticMemory, Locale, StepTier};

type Steps = [&'static str; 5];

struct TierSteps {
    es: Steps,
    en: Steps,
}

struct IntentSteps {
    basic: TierSteps,
    advanced: TierSteps,
}

const NO_POWER: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Verificar que el cable de alimentación esté bien conectado al equipo y al tomacorriente.",
            "Probar el tomacorriente con otro aparato, por ejemplo una lámpara, para confirmar que tiene energía.",
            "Si hay una zapatilla o estabilizador de por medio, conectar el equipo directo a la pared.",
            "Con el equipo desenchufado, mantener presionado el botón de encendido 30 segundos y volver a enchufarlo.",
            "Observar si se enciende alguna luz o se escucha algún ventilador al presionar el botón de encendido.",
        ],
        en: [
            "Check that the power cable is firmly connected to the device and to the wall outlet.",
            "Test the outlet with another appliance, such as a lamp, to confirm it has power.",
            "If there is a power strip or UPS in between, plug the device directly into the wall.",
            "With the device unplugged, hold the power button for 30 seconds, then plug it back in.",
            "Watch for any light or fan noise when you press the power button.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Revisar que el interruptor de la fuente, en la parte trasera del gabinete, esté en posición de encendido.",
            "Desconectar todos los periféricos (USB, impresoras, discos externos) y volver a intentar el encendido.",
            "En notebooks, quitar la batería si es extraíble y encender solo con el cargador conectado.",
            "Probar con otro cable de alimentación o cargador compatible.",
            "Solo si hay experiencia, abrir el gabinete y verificar que los conectores de la fuente a la placa madre estén firmes.",
        ],
        en: [
            "Check that the power supply switch at the back of the case is in the ON position.",
            "Disconnect all peripherals (USB devices, printers, external drives) and try powering on again.",
            "On laptops, remove the battery if it is removable and power on with only the charger connected.",
            "Try a different compatible power cable or charger.",
            "Only if you are comfortable doing so, open the case and check that the power supply connectors to the motherboard are seated.",
        ],
    },
};

const NO_NETWORK: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Reiniciar el router desenchufándolo 30 segundos y volviéndolo a enchufar.",
            "Verificar que el Wi-Fi del equipo esté activado y que no esté en modo avión.",
            "Comprobar si otros dispositivos de la casa tienen conexión a internet.",
            "Olvidar la red Wi-Fi en el equipo y volver a conectarse ingresando la contraseña.",
            "Acercar el equipo al router para descartar problemas de señal.",
        ],
        en: [
            "Restart the router by unplugging it for 30 seconds and plugging it back in.",
            "Make sure Wi-Fi is enabled on the device and airplane mode is off.",
            "Check whether other devices in the house can reach the internet.",
            "Forget the Wi-Fi network on the device and reconnect by entering the password again.",
            "Move the device closer to the router to rule out signal problems.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Conectar el equipo al router con un cable de red para descartar el Wi-Fi.",
            "Revisar las luces del módem: si la luz de internet está roja o apagada, el problema es del proveedor.",
            "Ejecutar el solucionador de problemas de red del sistema operativo.",
            "Configurar DNS públicos, por ejemplo 1.1.1.1 y 8.8.8.8, en la conexión.",
            "Actualizar o reinstalar el controlador de la placa de red desde el administrador de dispositivos.",
        ],
        en: [
            "Connect the device to the router with an Ethernet cable to rule out Wi-Fi.",
            "Check the modem lights: if the internet light is red or off, the issue is with the provider.",
            "Run the operating system's network troubleshooter.",
            "Set public DNS servers, for example 1.1.1.1 and 8.8.8.8, on the connection.",
            "Update or reinstall the network adapter driver from the device manager.",
        ],
    },
};

const SLOW_PERFORMANCE: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Reiniciar el equipo por completo, no solo suspenderlo.",
            "Cerrar los programas y pestañas del navegador que no se estén usando.",
            "Verificar que haya al menos un 10% de espacio libre en el disco.",
            "Instalar las actualizaciones pendientes del sistema y reiniciar.",
            "Desactivar los programas que arrancan automáticamente al iniciar.",
        ],
        en: [
            "Fully restart the device rather than just putting it to sleep.",
            "Close programs and browser tabs you are not using.",
            "Make sure at least 10% of the disk space is free.",
            "Install pending system updates and restart.",
            "Disable programs that launch automatically at startup.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Abrir el administrador de tareas y ver qué proceso consume más CPU, memoria o disco.",
            "Ejecutar un análisis completo con el antivirus.",
            "Desinstalar programas que no se usen, especialmente barras de herramientas u optimizadores.",
            "Revisar el estado de salud del disco con la herramienta del fabricante o los datos SMART.",
            "Verificar la temperatura del equipo y limpiar el polvo de las rejillas de ventilación.",
        ],
        en: [
            "Open the task manager and see which process uses the most CPU, memory or disk.",
            "Run a full antivirus scan.",
            "Uninstall programs you don't use, especially toolbars or optimizer utilities.",
            "Check the disk health with the manufacturer's tool or SMART data.",
            "Check the device temperature and clean dust from the air vents.",
        ],
    },
};

const DISPLAY: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Verificar que el monitor esté encendido y que el cable de video esté firme en ambos extremos.",
            "Subir el brillo de la pantalla con las teclas o con el menú del monitor.",
            "Seleccionar la entrada correcta del monitor (HDMI, DisplayPort o VGA) desde su menú.",
            "Probar con otro cable de video o con otro puerto.",
            "Conectar el equipo a otro monitor o televisor para ver si da imagen.",
        ],
        en: [
            "Check that the monitor is on and the video cable is firm at both ends.",
            "Turn up the screen brightness using the keys or the monitor menu.",
            "Select the correct monitor input (HDMI, DisplayPort or VGA) from its menu.",
            "Try a different video cable or port.",
            "Connect the device to another monitor or TV to see if it shows a picture.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Presionar Windows + Ctrl + Shift + B para reiniciar el controlador de video.",
            "Arrancar en modo seguro para descartar problemas del controlador de video.",
            "Actualizar o revertir el controlador de la placa de video.",
            "Revisar la resolución y la frecuencia de actualización en la configuración de pantalla.",
            "Si hay placa de video dedicada, conectar el monitor a su salida y no a la de la placa madre.",
        ],
        en: [
            "Press Windows + Ctrl + Shift + B to restart the graphics driver.",
            "Boot into safe mode to rule out a graphics driver problem.",
            "Update or roll back the graphics card driver.",
            "Check the resolution and refresh rate in the display settings.",
            "If there is a dedicated graphics card, connect the monitor to its output instead of the motherboard's.",
        ],
    },
};

const AUDIO: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Verificar que el volumen no esté silenciado ni al mínimo.",
            "Revisar que los parlantes o auriculares estén bien conectados y encendidos.",
            "Elegir el dispositivo de salida correcto en la configuración de sonido.",
            "Probar el sonido con otro programa o video para descartar la aplicación.",
            "Reiniciar el equipo y volver a probar el sonido.",
        ],
        en: [
            "Check that the volume is not muted or at minimum.",
            "Make sure the speakers or headphones are connected properly and switched on.",
            "Select the correct output device in the sound settings.",
            "Test sound with another program or video to rule out the application.",
            "Restart the device and test the sound again.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Ejecutar el solucionador de problemas de audio del sistema.",
            "Actualizar o reinstalar el controlador de audio.",
            "Desactivar las mejoras de audio en las propiedades del dispositivo de salida.",
            "Probar los parlantes o auriculares en otro equipo.",
            "Revisar que el servicio de audio del sistema esté en ejecución.",
        ],
        en: [
            "Run the system's audio troubleshooter.",
            "Update or reinstall the audio driver.",
            "Disable audio enhancements in the output device properties.",
            "Test the speakers or headphones on another device.",
            "Check that the system audio service is running.",
        ],
    },
};

const PERIPHERAL: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Desconectar el dispositivo y volver a conectarlo, probando otro puerto USB.",
            "Verificar que el dispositivo tenga pilas cargadas o esté encendido.",
            "Reiniciar el equipo con el dispositivo conectado.",
            "En impresoras, revisar que tengan papel y tinta y que no haya hojas trabadas.",
            "Si es inalámbrico, volver a emparejarlo por Bluetooth o con su receptor.",
        ],
        en: [
            "Unplug the device and plug it back in, trying another USB port.",
            "Check that the device has charged batteries or is switched on.",
            "Restart the computer with the device connected.",
            "For printers, check there is paper and ink and no paper jam.",
            "If it is wireless, pair it again over Bluetooth or with its receiver.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Revisar en el administrador de dispositivos si aparece con un signo de advertencia.",
            "Descargar e instalar el controlador desde la web del fabricante.",
            "Eliminar el dispositivo del sistema y volver a agregarlo.",
            "En impresoras, cancelar los trabajos pendientes y reiniciar la cola de impresión.",
            "Probar el dispositivo en otro equipo para descartar una falla del hardware.",
        ],
        en: [
            "Check the device manager for a warning sign next to the device.",
            "Download and install the driver from the manufacturer's website.",
            "Remove the device from the system and add it again.",
            "For printers, cancel all pending jobs and restart the print spooler.",
            "Try the device on another computer to rule out a hardware fault.",
        ],
    },
};

const APP_INSTALL: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Descargar el programa solo desde la web oficial o la tienda de aplicaciones del sistema.",
            "Verificar que el equipo cumpla los requisitos mínimos del programa.",
            "Ejecutar el instalador y seguir el asistente aceptando las opciones recomendadas.",
            "Reiniciar el equipo si el instalador lo pide.",
            "Abrir el programa desde el menú de inicio para confirmar que quedó instalado.",
        ],
        en: [
            "Download the program only from the official website or the system app store.",
            "Check that the device meets the program's minimum requirements.",
            "Run the installer and follow the wizard, accepting the recommended options.",
            "Restart the device if the installer asks for it.",
            "Open the program from the start menu to confirm it is installed.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Ejecutar el instalador como administrador.",
            "Desactivar temporalmente el antivirus si bloquea la instalación y reactivarlo al terminar.",
            "Liberar espacio en disco si el instalador indica que no alcanza.",
            "Desinstalar versiones anteriores del programa antes de instalar la nueva.",
            "Revisar el registro de eventos del sistema para ver el error exacto de la instalación.",
        ],
        en: [
            "Run the installer as administrator.",
            "Temporarily disable the antivirus if it blocks the installation, and turn it back on afterwards.",
            "Free up disk space if the installer reports there is not enough.",
            "Uninstall previous versions of the program before installing the new one.",
            "Check the system event log for the exact installation error.",
        ],
    },
};

const ACCOUNT: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Verificar que el correo o usuario esté escrito correctamente, sin espacios.",
            "Revisar que Bloq Mayús esté desactivado al escribir la contraseña.",
            "Usar la opción \"Olvidé mi contraseña\" para restablecerla.",
            "Buscar el correo de recuperación también en la carpeta de spam.",
            "Probar iniciar sesión desde otro navegador o en una ventana de incógnito.",
        ],
        en: [
            "Check that the email or username is typed correctly, without spaces.",
            "Make sure Caps Lock is off when typing the password.",
            "Use the \"Forgot my password\" option to reset it.",
            "Look for the recovery email in the spam folder as well.",
            "Try signing in from another browser or in a private window.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Borrar las cookies y la caché del navegador para ese sitio.",
            "Verificar que la fecha y la hora del equipo sean correctas.",
            "Si hay verificación en dos pasos, sincronizar la app de autenticación o usar un código de respaldo.",
            "Revisar si la cuenta quedó bloqueada por intentos fallidos y esperar el tiempo indicado.",
            "Contactar al administrador de la cuenta si es una cuenta corporativa o educativa.",
        ],
        en: [
            "Clear the browser cookies and cache for that site.",
            "Make sure the device date and time are correct.",
            "If two-step verification is on, resync the authenticator app or use a backup code.",
            "Check whether the account was locked after failed attempts and wait the indicated time.",
            "Contact the account administrator if it is a work or school account.",
        ],
    },
};

const GENERIC: IntentSteps = IntentSteps {
    basic: TierSteps {
        es: [
            "Apagar el equipo, esperar un minuto y volver a encenderlo.",
            "Anotar el mensaje de error exacto que aparece, si lo hay.",
            "Verificar que el sistema operativo tenga las últimas actualizaciones instaladas.",
            "Revisar que todos los cables estén firmes y sin daños visibles.",
            "Probar si el problema también ocurre con otro usuario del equipo.",
        ],
        en: [
            "Shut the device down, wait one minute and turn it back on.",
            "Write down the exact error message, if one appears.",
            "Check that the operating system has the latest updates installed.",
            "Check that all cables are firmly connected and show no visible damage.",
            "Check whether the problem also happens with another user account on the device.",
        ],
    },
    advanced: TierSteps {
        es: [
            "Buscar errores recientes en el visor de eventos del sistema.",
            "Iniciar el sistema en modo seguro y comprobar si el problema persiste.",
            "Desinstalar el último programa o actualización instalada antes de que empezara el problema.",
            "Restaurar el sistema a un punto anterior a la aparición del problema.",
            "Hacer una copia de seguridad de los datos importantes antes de intentar reparaciones mayores.",
        ],
        en: [
            "Look for recent errors in the system event viewer.",
            "Start the system in safe mode and check whether the problem persists.",
            "Uninstall the last program or update installed before the problem started.",
            "Restore the system to a restore point from before the problem appeared.",
            "Back up important data before attempting major repairs.",
        ],
    },
};

fn table(intent: Intent) -> &'static IntentSteps {
    match intent {
        Intent::NoPower => &NO_POWER,
        Intent::NoNetwork => &NO_NETWORK,
        Intent::SlowPerformance => &SLOW_PERFORMANCE,
        Intent::Display => &DISPLAY,
        Intent::Audio => &AUDIO,
        Intent::Peripheral => &PERIPHERAL,
        Intent::AppInstall => &APP_INSTALL,
        Intent::Account => &ACCOUNT,
        Intent::Generic => &GENERIC,
    }
}

fn tier_steps(intent: Intent, tier: StepTier, locale: Locale) -> &'static Steps {
    let steps = table(intent);
    let tier = match tier {
        StepTier::Basic => &steps.basic,
        StepTier::Advanced => &steps.advanced,
    };
    if locale.is_spanish() {
        &tier.es
    } else {
        &tier.en
    }
}

/// Candidate steps for `intent` and `tier`, intent-specific ones first
pub fn candidates(intent: Intent, tier: StepTier, locale: Locale) -> impl Iterator<Item = &'static str> {
    let own = tier_steps(intent, tier, locale).iter();
    let generic = (intent != Intent::Generic)
        .then(|| tier_steps(Intent::Generic, tier, locale).iter())
        .into_iter()
        .flatten();
    own.chain(generic).copied()
}

/// First candidate that does not duplicate anything already issued
pub fn pick(intent: Intent, tier: StepTier, locale: Locale, memory: &DiagnosticMemory) -> Option<&'static str> {
    candidates(intent, tier, locale).find(|text| !memory.is_duplicate(text))
}
