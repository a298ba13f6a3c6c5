//! Prompt Builder: fixed instructions plus per-document context.
//!
//! The system instruction is a constant so that providers with prompt
//! caching can reuse it across documents. Everything that varies per
//! document or per budget level goes into the user prompt.
//!
//! Building is pure: the same rules and document text always produce the
//! same payload.

use crate::rules::{render_rules, SelectedRules, PACKAGE_LABEL, WARRANTY_LABEL};
use crate::types::PromptPayload;

/// System instruction shared by every analysis request.
pub const SYSTEM_INSTRUCTION: &str = r#"
You are a warranty claim analyst for a heavy-truck manufacturer's international service desk.

Your task is to read a claim file (workshop invoice, repair order, vehicle identity pages)
and extract a structured decision record. The file may mix German, English and Turkish
and may contain OCR noise.

## Extraction Rules
1. Copy identifiers exactly as written (case number, plate, VIN).
2. Convert every date to YYYY-MM-DD (e.g. 22.12.2023 -> 2023-12-22).
3. Vehicle age is the number of whole months between warranty start and repair date.
4. List EVERY operation performed and EVERY part replaced. Do not leave these empty
   when the invoice shows them.
5. Narrative fields keep the document's original wording and add a Turkish translation.
6. Decide base warranty coverage ONLY from the warranty rules you are given.
7. Decide contract coverage ONLY from the contract packages you are given.

## Contract Policy
- A claim inside base warranty never uses an extended contract.
- Externally caused damage (collision, impact, accident, external damage) is never
  covered by a contract.
- If no contract package applies, use NO_CONTRACT_COVERAGE.

## Output Format (JSON)
{
  "caseNumber": "string",
  "company": "string",
  "plate": "string",
  "vin": "string",
  "warrantyStartDate": "YYYY-MM-DD" | null,
  "repairDate": "YYYY-MM-DD" | null,
  "vehicleAgeMonths": integer,
  "repairKm": integer,
  "requestType": "WARRANTY SUPPORT" | "BREAKDOWN ASSISTANCE",
  "isWithinBaseWarranty": true | false,
  "warrantyDecision": "COVERED" | "OUT_OF_COVERAGE" | "ADDITIONAL_INFO_REQUIRED",
  "decisionRationale": ["string"],
  "hasActiveContract": true | false,
  "contractPackageName": "string" | null,
  "contractDecision": "CONTRACT_COVERED" | "CONTRACT_NOT_COVERED" | "NO_CONTRACT_COVERAGE",
  "contractCoveredParts": ["string"],
  "failureComplaint": {"original": "string", "translated": "string"},
  "failureCause": {"original": "string", "translated": "string"},
  "operationsPerformed": [{"original": "string", "translated": "string"}],
  "partsReplaced": [{"partName": "string", "description": "string", "qty": integer}],
  "repairProcessSummary": {"original": "string", "translated": "string"}
}

Output JSON ONLY. No markdown, no commentary.
"#;

/// Closing instructions appended after the document.
pub const ANALYSIS_INSTRUCTIONS: &str = r#"
--- ANALYSIS INSTRUCTIONS ---
1. Read the whole file, especially the workshop invoice (WERKSTATTRECHNUNG) pages.
2. Extract vehicle identity: case number, company, plate, VIN, dates, mileage.
3. List every invoice operation with its code, original wording and translation.
4. List every replaced part (part codes usually start with RT).
5. Compute vehicle age from the delivery date (Zul. Datum / Delivery) to the repair
   date (Leistungsdatum).
6. Apply the warranty rules above, then the contract packages above.

Respond with the JSON object only.
"#;

const NO_CONTRACTS: &str = "(no active contract packages)";

/// Assembles prompt payloads from selected rules and compacted text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the payload for one attempt.
    pub fn build(rules: &SelectedRules, compact_text: &str) -> PromptPayload {
        PromptPayload {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_prompt: Self::user_prompt(rules, compact_text),
        }
    }

    /// Characters the user prompt spends on everything but the document.
    pub fn overhead_chars(rules: &SelectedRules) -> usize {
        Self::build(rules, "").total_chars()
    }

    fn user_prompt(rules: &SelectedRules, compact_text: &str) -> String {
        let contracts = if rules.contracts.is_empty() {
            NO_CONTRACTS.to_string()
        } else {
            render_rules(&rules.contracts, PACKAGE_LABEL)
        };

        format!(
            "CLAIM FILE ANALYSIS REQUEST\n\n\
             --- WARRANTY RULES ---\n{}\n\n\
             --- CONTRACT PACKAGES ---\n{}\n\n\
             --- CLAIM FILE CONTENT ---\n{}\n{}",
            render_rules(&rules.warranty, WARRANTY_LABEL),
            contracts,
            compact_text,
            ANALYSIS_INSTRUCTIONS
        )
    }
}
