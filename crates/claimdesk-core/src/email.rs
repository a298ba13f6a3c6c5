//! Customer email drafts rendered from an analysis result.
//!
//! Drafts are templated, not generated by the model, so the wording of a
//! coverage decision never drifts from the decision fields themselves.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{or_na, AnalysisResult, WarrantyDecision};

/// Language of the rendered draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmailLanguage {
    #[default]
    #[serde(rename = "tr")]
    Turkish,
    #[serde(rename = "en")]
    English,
}

/// Rendered subject and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

impl EmailDraft {
    pub fn render(result: &AnalysisResult, language: EmailLanguage) -> Self {
        match language {
            EmailLanguage::Turkish => Self {
                subject: subject(result, "Yurtdışı Dosyası Hk."),
                body: turkish_body(result),
            },
            EmailLanguage::English => Self {
                subject: subject(result, "International IZE File"),
                body: english_body(result),
            },
        }
    }

    /// Write the draft into the result's email fields.
    pub fn apply(self, result: &mut AnalysisResult) {
        result.email_subject = self.subject;
        result.email_body = self.body;
    }
}

fn subject(result: &AnalysisResult, suffix: &str) -> String {
    let company = result.company.split_whitespace().next().unwrap_or("N/A");
    format!(
        "{} - {} - {} - {} - {}",
        or_na(&result.case_number),
        or_na(&result.vin),
        or_na(&result.plate),
        company,
        suffix
    )
}

fn turkish_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|| "belirtilen".to_string())
}

/// Operations joined as a sentence fragment: `a, b ve c`.
fn turkish_operations(result: &AnalysisResult) -> String {
    let ops: Vec<&str> = result
        .operations_performed
        .iter()
        .map(|op| op.preferred().trim())
        .filter(|op| !op.is_empty())
        .collect();

    match ops.split_last() {
        None => "kontrol ve diagnostik işlemleri".to_string(),
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} ve {}", rest.join(", "), last),
    }
}

fn turkish_body(result: &AnalysisResult) -> String {
    let warranty_text = if result.is_within_base_warranty {
        "içinde"
    } else {
        "dışında"
    };

    let parts_summary = if result.parts_replaced.is_empty() {
        "Onarım sürecinde herhangi bir parça değişimi yapılmamış, işlemler kontrol, diagnostik ve yazılım güncelleme kapsamında gerçekleştirilmiştir."
    } else {
        "Onarım sürecinde parça değişimi gerçekleştirilmiş olup işlemler ilgili parçalar üzerinden tamamlanmıştır."
    };

    let summary = result.repair_process_summary.preferred().trim();
    let summary_block = if summary.is_empty() {
        String::new()
    } else {
        format!("\n\n\nDeğerlendirme özeti: {}", summary)
    };

    format!(
        "Merhaba,\n\n\n\n\
         Aracınıza ait {case} numaralı yurtdışı IZE dosyası incelenmiş olup yapılan değerlendirme aşağıda bilgilerinize sunulmaktadır.\n\n\n\n\
         İlgili aracın {start} tarihli teslim bilgisi ve {repair} tarihli onarım kaydı doğrultusunda, onarımın garanti süresi {warranty} kaldığı değerlendirilmiştir.\n\n\n\n\
         Araç için gerçekleştirilen inceleme kapsamında {ops} uygulanmıştır.\n\n\n\n\
         {parts}\n\n\n\n\
         İlgili IZE dosyasına ait fatura tarafınıza ayrıca iletilecektir.{summary}\n\n\n\n\
         Bilgilerinize sunarız.",
        case = or_na(&result.case_number),
        start = turkish_date(result.warranty_start_date),
        repair = turkish_date(result.repair_date),
        warranty = warranty_text,
        ops = turkish_operations(result),
        parts = parts_summary,
        summary = summary_block,
    )
}

fn section(body: &mut String, title: &str, lines: Vec<String>) {
    body.push('\n');
    body.push_str(title);
    body.push('\n');
    body.push_str(&"-".repeat(title.chars().count()));
    body.push('\n');
    if lines.is_empty() {
        body.push_str("Not specified\n");
    }
    for line in lines {
        body.push_str(&line);
        body.push('\n');
    }
}

fn english_body(result: &AnalysisResult) -> String {
    let date = |d: Option<NaiveDate>| d.map_or_else(|| "N/A".to_string(), |d| d.to_string());
    let warranty_status = match result.warranty_decision {
        WarrantyDecision::Covered => "Covered",
        WarrantyDecision::OutOfCoverage => "Out of Coverage",
        WarrantyDecision::AdditionalInfoRequired => "Additional Information Required",
    };

    let mut body = format!(
        "Dear Sir/Madam,\n\nYour IZE file {} has been analyzed.\n",
        or_na(&result.case_number)
    );

    section(
        &mut body,
        "VEHICLE INFORMATION",
        vec![
            format!("Company: {}", or_na(&result.company)),
            format!("Plate: {}", or_na(&result.plate)),
            format!("VIN: {}", or_na(&result.vin)),
            format!("Mileage: {} km", result.repair_km),
            format!("Warranty Start: {}", date(result.warranty_start_date)),
            format!("Repair Date: {}", date(result.repair_date)),
        ],
    );

    section(
        &mut body,
        "WARRANTY EVALUATION",
        vec![
            format!(
                "Within Base Warranty: {}",
                if result.is_within_base_warranty { "Yes" } else { "No" }
            ),
            format!("Warranty Decision: {}", warranty_status),
        ],
    );

    section(
        &mut body,
        "FAILURE INFORMATION",
        vec![
            format!("Customer Complaint: {}", or_na(&result.failure_complaint.original)),
            format!("Failure Cause: {}", or_na(&result.failure_cause.original)),
        ],
    );

    section(
        &mut body,
        "DECISION RATIONALE",
        result
            .decision_rationale
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect(),
    );

    section(
        &mut body,
        "OPERATIONS PERFORMED",
        result
            .operations_performed
            .iter()
            .map(|op| format!("• {}", op.original))
            .collect(),
    );

    section(
        &mut body,
        "PARTS REPLACED",
        result
            .parts_replaced
            .iter()
            .map(|p| format!("• {} - {}", p.part_name, p.description))
            .collect(),
    );

    let summary = result.repair_process_summary.original.trim();
    section(
        &mut body,
        "REPAIR SUMMARY",
        if summary.is_empty() {
            vec![]
        } else {
            vec![summary.to_string()]
        },
    );

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BilingualText, PartReplaced};

    fn sample() -> AnalysisResult {
        AnalysisResult {
            case_number: "IZE26006539".to_string(),
            company: "Spedition Muster GmbH".to_string(),
            plate: "M-AB 1234".to_string(),
            vin: "VF611A165KD000123".to_string(),
            warranty_start_date: NaiveDate::from_ymd_opt(2023, 12, 22),
            repair_date: NaiveDate::from_ymd_opt(2025, 3, 10),
            operations_performed: vec![
                BilingualText::new(
                    "Tachometer Geber auswechseln",
                    Some("Takometre sensörü değişimi".to_string()),
                ),
                BilingualText::plain("Tachoprüfung Digital"),
                BilingualText::plain("Probefahrt"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_turkish_subject_uses_first_company_word() {
        let draft = EmailDraft::render(&sample(), EmailLanguage::Turkish);
        assert_eq!(
            draft.subject,
            "IZE26006539 - VF611A165KD000123 - M-AB 1234 - Spedition - Yurtdışı Dosyası Hk."
        );
    }

    #[test]
    fn test_turkish_body() {
        let draft = EmailDraft::render(&sample(), EmailLanguage::Turkish);
        assert!(draft.body.contains("22.12.2023 tarihli teslim"));
        assert!(draft.body.contains("10.03.2025 tarihli onarım"));
        assert!(draft.body.contains("garanti süresi dışında"));
        assert!(draft
            .body
            .contains("Takometre sensörü değişimi, Tachoprüfung Digital ve Probefahrt uygulanmıştır"));
        assert!(draft.body.contains("herhangi bir parça değişimi yapılmamış"));
        assert!(!draft.body.contains("Değerlendirme özeti"));
    }

    #[test]
    fn test_turkish_body_without_operations() {
        let result = AnalysisResult {
            is_within_base_warranty: true,
            repair_process_summary: BilingualText::plain("Sensör değiştirildi."),
            ..Default::default()
        };
        let draft = EmailDraft::render(&result, EmailLanguage::Turkish);
        assert!(draft.body.contains("kontrol ve diagnostik işlemleri uygulanmıştır"));
        assert!(draft.body.contains("garanti süresi içinde"));
        assert!(draft.body.contains("belirtilen tarihli teslim"));
        assert!(draft.body.contains("Değerlendirme özeti: Sensör değiştirildi."));
        assert!(draft.subject.starts_with("N/A - N/A - N/A - N/A"));
    }

    #[test]
    fn test_english_report() {
        let mut result = sample();
        result.parts_replaced = vec![PartReplaced {
            part_name: "RT 7421000123".to_string(),
            description: "Tachometer sender".to_string(),
            qty: 1,
        }];
        let draft = EmailDraft::render(&result, EmailLanguage::English);
        assert!(draft.subject.ends_with("Spedition - International IZE File"));
        assert!(draft.body.contains("Warranty Start: 2023-12-22"));
        assert!(draft.body.contains("• Tachometer Geber auswechseln"));
        assert!(draft.body.contains("• RT 7421000123 - Tachometer sender"));
        assert!(draft.body.contains("DECISION RATIONALE\n------------------\nNot specified"));
    }

    #[test]
    fn test_apply_sets_fields() {
        let mut result = sample();
        EmailDraft::render(&sample(), EmailLanguage::English).apply(&mut result);
        assert!(result.email_subject.contains("International IZE File"));
        assert!(result.email_body.starts_with("Dear Sir/Madam"));
    }
}
