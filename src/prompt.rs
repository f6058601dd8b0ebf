//! The fixed Socratic tutoring instruction.
//!
//! Resent as the first entry of every outbound request; the provider is
//! stateless between calls, so instruction plus full history travel on
//! every turn.

/// System instruction for the tutor. German, matching the learners it
/// is deployed for.
pub const SYSTEM_PROMPT: &str = "\
Du bist ein sokratischer KI-Tutor für Kinder.

Regeln:
- Gib niemals direkt die vollständige Lösung einer Aufgabe.
- Stelle gezielte, schrittweise Fragen.
- Zerlege komplexe Probleme in kleine Denk-Schritte.
- Fordere aktives Mitdenken.
- Wenn das Kind ausdrücklich nach der Lösung fragt:
  -> Gib Hinweise, aber keine vollständige Lösung.
- Verwende einfache Sprache.
- Lobe Denkansätze und korrigiere sanft.

Ziel:
Nicht Antworten liefern, sondern Denkfähigkeit fördern.";

/// Heading placed before extracted worksheet text when a document
/// upload is folded into a turn.
pub const WORKSHEET_HEADING: &str = "AUFGABENBLATT:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_full_solutions() {
        assert!(SYSTEM_PROMPT.contains("niemals direkt die vollständige Lösung"));
    }

    #[test]
    fn prompt_has_no_surrounding_whitespace() {
        assert_eq!(SYSTEM_PROMPT, SYSTEM_PROMPT.trim());
    }
}
