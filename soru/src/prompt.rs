//! Fixed instruction templates sent to the model.
//!
//! Placeholders are `{name}` and are filled in a single pass, so values that
//! happen to contain placeholder text are inserted verbatim.

use crate::solution::{AnswerChoice, Solution, Subject};

pub const SOLVE_TEMPLATE: &str = r#"**PERSONA & ROL (ÇOK KATI):** Sen, {subject} dersinde lise öğrencilerine pratik, sade ve adım adım çözümler sunan samimi bir öğretmensin. **GÖREV:** Verilen resmi ve ipuçlarını kullanarak, aşağıdaki 4 bölümü de eksiksiz ve istenen formatta doldurarak bir JSON nesnesi oluştur. **JSON ŞEMASI (ZORUNLU):** {"simplified_question": "...", "solution_steps": "...", "final_answer": "...", "recommendations": "..."} **İÇERİK KURALLARI:** 1.  **simplified_question**: Soruyu kendi kelimelerinle, samimi ve anlaşılır bir dille kısaca açıkla. 2.  **solution_steps**: Soruyu bir öğrencinin defterine yazacağı gibi, kısa ve öz adımlarla çöz. Her adımı yeni bir satıra yaz ('\n' ile ayır). Her adımın başına dikkat çekici bir emoji (örn: 🎯, 🔢, ➡️, ✅) koy ve ardından adımın açıklamasını yaz. **Eğer çözüm birden fazla durumu (örn: Durum 1, Durum 2) içeriyorsa, her durumun başına ### Durum Başlığı ### formatında bir başlık ekle.** Çok uzun cümlelerden kaçın. 3.  **final_answer**: Bu alan, SADECE tek bir, tam ve geçerli bir matematiksel ifade içermelidir. Bu ifade, tek veya çift dolar işareti arasına alınmalıdır. ASLA açıklayıcı metin veya markdown formatı (**...**) içermemelidir. 4.  **recommendations**: Öğrencinin çözümünü ve (varsa) hatalarını analiz ederek, kişiselleştirilmiş, gerçekten faydalı ve eyleme dönük 2-3 tavsiye oluştur. Tavsiyeleri '\n' ile ayır. **BAŞLIK KURALI (KATI):** Başlıkların (###...###) içine ASLA matematiksel ifade ($...$) veya markdown (**...**) koyma. Başlıklar sadece düz metin olmalıdır. **MATEMATİK FORMATLAMA (EN ÖNEMLİ VE KATI KURAL):** - **BÜTÜNLÜK (ATOMİKLİK):** Birbirine ait olan bir denklemi veya ifadeyi ASLA parçalara ayırma. Tüm ifade tek bir '$...$' veya '$$...$$' içinde olmalıdır. - **KAPSAM:** Sadece matematiksel ifadeler, değişkenler, sayılar ve semboller dolar işaretleri arasına alınmalıdır. Türkçe metinler DIŞARIDA kalmalıdır. - **BOŞLUK:** Türkçe kelime ile '$' arasında HER ZAMAN bir boşluk bırak. - **ALT İNDİS:** Değişkene alt indis eklerken \text{} KULLANMA. Doğru: "$V_{Can}$". - **GEÇERLİ KOMUTLAR:** Sadece standart LaTeX komutlarını kullan (örn: \neq, \times, \frac, \Rightarrow, \{, \}). - **YASAKLI İFADELER (KURAL İHLALİ):** Cevaplarında ASLA 'eq', 'neq', 'ext{...}', 'coder 0', markdown formatı (**...**) veya bunlara benzer, standart LaTeX komutu olmayan anlamsız metinler üretme. BU BİR KURAL İHLALİDİR. - **JSON İÇİN ÇİFT TERS TAKSİM:** JSON çıktısı ürettiğin için, tüm LaTeX komutlarının (örn: '\frac') önünde **MUTLAKA** çift ters taksim ('\\') olmalıdır. **İPUÇLARI:** - Ders: {subject} - Kullanıcının Verdiği Cevap: {answer} {correction}"#;

pub const CORRECTION_TEMPLATE: &str =
    r#"- KULLANICI DÜZELTMESİ: "{correction}". Lütfen çözümünü bu yeni bilgiye göre düzelt."#;

pub const CHAT_TEMPLATE: &str = r#"Sen, bir önceki cevabı sen vermiş olan bir öğretmensin. Öğrencinin yazdığı yeni mesajı, SANA VERİLEN ORİJİNAL SORU RESMİNİ ve daha önce verdiğin çözümü dikkate alarak analiz et. **GÖREVLER:** 1.  **Analiz Et:** Öğrencinin mesajının bir soru mu yoksa bir teşekkür ifadesi mi ("teşekkür ederim", "sağ ol", "anladım" vb.) olduğunu anla. 2.  **Cevap Ver:** * **Eğer bir soru ise:** Soruyu, hem resimdeki hem de önceki çözümdeki bağlamı kullanarak, net ve basit bir dille, aşağıdaki matematik formatlama kurallarına uyarak cevapla. * **Eğer bir teşekkür ise:** "Rica ederim, ne demek! Anlamana sevindim. Unutma, sormaktan çekinme, her soru yeni bir öğrenme fırsatıdır. Başarılar dilerim! 😊" gibi samimi ve cesaretlendirici bir cevap ver. * **Eğer konu dışı ise:** "Sevgili öğrencim, benim amacım şu anki soruyu en iyi şekilde anlamana yardımcı olmak. Farklı bir konu hakkında yorum yapamam ama bu soruyla ilgili aklına takılan her şeyi memnuniyetle açıklarım!" şeklinde cevap ver. **MATEMATİK FORMATLAMA KURALI (ÇOK KATI):** - Cevaplarında ASLA kalın font (`**...**`) kullanma. - Sadece ve sadece matematiksel ifadeler, denklemler, değişkenler, sayılar ve semboller tek dolar '$...$' arasına alınmalıdır. - Açıklayıcı Türkçe metinler KESİNLİKLE dolar işaretlerinin DIŞINDA kalmalıdır. - Türkçe bir kelime ile matematiksel ifadenin başladığı '$' işareti arasında ve bittiği '$' işareti ile sonraki kelime arasında HER ZAMAN bir boşluk bırak. **ÖNCEKİ SORU VE ÇÖZÜMÜN (BAĞLAM İÇİN):** - Sorunun Basit Hali: {simplified_question} - Çözüm Adımları: {solution_steps} - Nihai Cevap: {final_answer} **ÖĞRENCİNİN YENİ MESAJI:** "{message}""#;

/// Property names the solve response schema declares, all required strings.
pub const SOLUTION_FIELDS: [&str; 4] = [
    "simplified_question",
    "solution_steps",
    "final_answer",
    "recommendations",
];

/// Instruction for a (re-)solve. A non-empty correction adds the
/// user-correction clause.
pub fn solve_prompt(subject: Subject, answer: AnswerChoice, correction: Option<&str>) -> String {
    let correction = correction
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| fill(CORRECTION_TEMPLATE, &[("correction", c)]))
        .unwrap_or_default();
    fill(
        SOLVE_TEMPLATE,
        &[
            ("subject", subject.name()),
            ("answer", answer.prompt_label()),
            ("correction", &correction),
        ],
    )
    .trim_end()
    .to_string()
}

/// Instruction for a follow-up question about an existing solution.
pub fn chat_prompt(solution: &Solution, message: &str) -> String {
    fill(
        CHAT_TEMPLATE,
        &[
            ("simplified_question", &solution.simplified_question),
            ("solution_steps", &solution.solution_steps),
            ("final_answer", &solution.final_answer),
            ("message", message),
        ],
    )
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(key, _)| {
            tail.starts_with(key) && tail[key.len()..].starts_with('}')
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution() -> Solution {
        Solution {
            simplified_question: "x'i bul".into(),
            solution_steps: "🎯 $x+1=2$".into(),
            final_answer: "$x=1$".into(),
            recommendations: "Tekrar et".into(),
        }
    }

    #[test]
    fn solve_prompt_embeds_subject_and_answer() {
        let prompt = solve_prompt(Subject::Cografya, AnswerChoice::B, None);
        assert!(prompt.starts_with("**PERSONA & ROL (ÇOK KATI):** Sen, Coğrafya dersinde"));
        assert!(prompt.contains("- Ders: Coğrafya - Kullanıcının Verdiği Cevap: B"));
        assert!(!prompt.contains("KULLANICI DÜZELTMESİ"));
        assert!(!prompt.contains("{subject}"));
    }

    #[test]
    fn solve_prompt_defaults_to_belirtilmedi() {
        let prompt = solve_prompt(Subject::Fizik, AnswerChoice::Unspecified, Some("   "));
        assert!(prompt.ends_with("Kullanıcının Verdiği Cevap: Belirtilmedi"));
    }

    #[test]
    fn solve_prompt_threads_correction() {
        let prompt = solve_prompt(
            Subject::Matematik,
            AnswerChoice::Unspecified,
            Some("üçgen ikizkenar"),
        );
        assert!(prompt.ends_with(
            "- KULLANICI DÜZELTMESİ: \"üçgen ikizkenar\". Lütfen çözümünü bu yeni bilgiye göre düzelt."
        ));
    }

    #[test]
    fn template_literals_survive() {
        let prompt = solve_prompt(Subject::Matematik, AnswerChoice::A, None);
        assert!(prompt.contains(r#"Doğru: "$V_{Can}$""#));
        assert!(prompt.contains(r#"{"simplified_question": "...""#));
        assert!(prompt.contains(r"('\n' ile ayır)"));
    }

    #[test]
    fn chat_prompt_includes_context_but_not_recommendations() {
        let prompt = chat_prompt(&solution(), "neden 1?");
        assert!(prompt.contains("- Sorunun Basit Hali: x'i bul"));
        assert!(prompt.contains("- Nihai Cevap: $x=1$"));
        assert!(prompt.ends_with("**ÖĞRENCİNİN YENİ MESAJI:** \"neden 1?\""));
        assert!(!prompt.contains("Tekrar et"));
    }

    #[test]
    fn values_are_not_substituted_twice() {
        let mut sol = solution();
        sol.simplified_question = "{message}".into();
        let prompt = chat_prompt(&sol, "merhaba");
        assert!(prompt.contains("- Sorunun Basit Hali: {message}"));
    }
}
