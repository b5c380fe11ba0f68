//! Builds the system instruction that grounds the simulated patient.
//!
//! The output is a pure function of the profile and mode: same inputs,
//! same string. Reply variety comes from the generation temperature, not
//! from here.

use crate::clinic::{ClinicProfile, Mode};

/// Fixed phrase for each service flag, in the order they are listed.
const SERVICE_PHRASES: [(&str, fn(&ClinicProfile) -> bool); 3] = [
    ("spinal decompression", |p| p.decompression),
    ("Class IV laser therapy", |p| p.class_iv_laser),
    ("shockwave therapy", |p| p.shockwave),
];

pub fn system_instructions(profile: &ClinicProfile, mode: Mode) -> String {
    let services = enabled_services(profile);
    let services = if services.is_empty() {
        "general chiropractic care".to_string()
    } else {
        services.join(", ")
    };

    format!(
        "You are role-playing a prospective patient calling {clinic} for the first time. \
The person on the line is a front-desk staff member. Stay in character for the whole \
call, speak the way a real caller would, and keep each reply to one or two sentences. \
Never mention that you are simulated.\n\
\n\
What you know about the clinic:\n\
- Practitioner: {practitioner}\n\
- First visit cost: {price}\n\
- Address: {address}\n\
- Office hours: {hours}\n\
- Services offered: {services}\n\
\n\
{persona}",
        clinic = profile.clinic_name,
        practitioner = profile.practitioner_name,
        price = format_price(profile.first_visit_cost),
        address = profile.address,
        hours = profile.office_hours,
        services = services,
        persona = persona_guidance(mode),
    )
}

fn enabled_services(profile: &ClinicProfile) -> Vec<&'static str> {
    SERVICE_PHRASES
        .iter()
        .filter(|(_, enabled)| enabled(profile))
        .map(|(phrase, _)| *phrase)
        .collect()
}

fn persona_guidance(mode: Mode) -> &'static str {
    match mode {
        Mode::Cooperative => {
            "You are an easygoing caller. Answer questions willingly, raise no objections \
unless something is genuinely unclear, and agree to schedule when the staff member \
proposes a time."
        }
        Mode::Challenging => {
            "You are a hesitant caller. Push back on the price and on how much time the \
visits will take, and make the staff member earn the booking, but let good answers \
gradually win you over."
        }
        Mode::Skeptical => {
            "You are a skeptical caller. Question whether the treatment actually works, \
ask what evidence there is, and hold off on committing to an appointment until your \
doubts are addressed."
        }
        Mode::Boundary => {
            "You are a caller who keeps drifting off topic and testing the staff member's \
professional boundaries with overly familiar remarks. Never say anything explicit, \
and allow yourself to be steered back when the staff member redirects the call."
        }
    }
}

/// `75.0` prints as `$75`, `75.5` as `$75.50`.
fn format_price(cost: f64) -> String {
    if cost.fract() == 0.0 {
        format!("${}", cost as i64)
    } else {
        format!("${cost:.2}")
    }
}
