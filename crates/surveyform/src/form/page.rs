//! HTML rendering of the form page.

use std::fmt::Write as _;

use super::SubmissionState;
use crate::submission::FormInput;
use crate::table::{AnswerTable, HEADER};

/// Questions shown above the three answer fields, in column order.
pub const QUESTIONS: [&str; 3] = [
    "1️⃣ Quais são as maiores dificuldades que você encontra no seu dia a dia em casa?",
    "2️⃣ O que costuma fazer quando precisa de ajuda ou quando algo dá errado (ex.: um problema de saúde ou uma emergência)?",
    "3️⃣ O que deixaria a sua rotina mais fácil e confortável?",
];

/// Everything needed to render one page.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    /// Page heading.
    pub title: &'a str,
    /// Outcome of the last submit, if any.
    pub state: &'a SubmissionState,
    /// Field values to put back in the form.
    pub input: &'a FormInput,
    /// The answers table, when the respondent asked to see it.
    pub answers: Option<Result<&'a AnswerTable, &'a str>>,
}

/// Escape text for use in HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn banner(state: &SubmissionState) -> String {
    match state {
        SubmissionState::Collecting { warning: None } => String::new(),
        SubmissionState::Collecting {
            warning: Some(warning),
        } => format!(
            "<p class=\"warning\">⚠️ {}</p>",
            escape_html(warning)
        ),
        SubmissionState::Submitting => {
            "<p class=\"info\">Salvando suas respostas...</p>".to_string()
        }
        SubmissionState::Succeeded { .. } => {
            "<p class=\"success\">✅ Resposta enviada com sucesso! Obrigado por participar.</p>"
                .to_string()
        }
        SubmissionState::Failed { reason } => format!(
            "<p class=\"error\">Erro ao salvar a resposta: {}</p>",
            escape_html(reason)
        ),
    }
}

fn answers_table(table: &AnswerTable) -> String {
    if table.is_empty() {
        return "<p>Nenhuma resposta enviada ainda.</p>".to_string();
    }

    let mut html = String::from("<table><thead><tr>");
    for column in HEADER {
        let _ = write!(html, "<th>{column}</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in table {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.timestamp),
            escape_html(row.name_or_empty()),
            escape_html(&row.answers[0]),
            escape_html(&row.answers[1]),
            escape_html(&row.answers[2]),
        );
    }
    html.push_str("</tbody></table>");
    html
}

/// Render the full page: form, banner and optional answers table.
#[must_use]
pub fn render_page(view: &PageView<'_>) -> String {
    // A stored submission clears the form; anything else keeps what was typed.
    let keep = !view.state.is_success();
    let value = |text: &str| if keep { escape_html(text) } else { String::new() };

    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>\
<h1>📝 {title}</h1>\
<p>Responda às perguntas abaixo. Suas respostas serão salvas em um arquivo CSV no repositório.</p>\
{banner}\
<form method=\"post\" action=\"/\">\
<p><label>Seu nome (opcional)<br><input type=\"text\" name=\"name\" value=\"{name}\"></label></p>\
<p><label>{q1}<br><textarea name=\"answer1\" rows=\"4\" cols=\"70\">{a1}</textarea></label></p>\
<p><label>{q2}<br><textarea name=\"answer2\" rows=\"4\" cols=\"70\">{a2}</textarea></label></p>\
<p><label>{q3}<br><textarea name=\"answer3\" rows=\"4\" cols=\"70\">{a3}</textarea></label></p>\
<p><button type=\"submit\">Enviar respostas</button></p>\
</form>",
        title = escape_html(view.title),
        banner = banner(view.state),
        name = value(&view.input.name),
        q1 = escape_html(QUESTIONS[0]),
        q2 = escape_html(QUESTIONS[1]),
        q3 = escape_html(QUESTIONS[2]),
        a1 = value(&view.input.answer1),
        a2 = value(&view.input.answer2),
        a3 = value(&view.input.answer3),
    );

    match view.answers {
        None => html.push_str(
            "<p><a href=\"/?show=1\">📊 Mostrar respostas já enviadas</a></p>",
        ),
        Some(answers) => {
            html.push_str("<p><a href=\"/\">📊 Ocultar respostas</a> · <a href=\"/answers.csv\">CSV</a></p>");
            match answers {
                Ok(table) => html.push_str(&answers_table(table)),
                Err(reason) => {
                    let _ = write!(
                        html,
                        "<p class=\"error\">Erro ao acessar o repositório: {}</p>",
                        escape_html(reason)
                    );
                }
            }
        }
    }

    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::Submission;

    fn view<'a>(
        state: &'a SubmissionState,
        input: &'a FormInput,
        answers: Option<Result<&'a AnswerTable, &'a str>>,
    ) -> PageView<'a> {
        PageView {
            title: "Questionário",
            state,
            input,
            answers,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"x\" & 'y'</b>"),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("ação"), "ação");
    }

    #[test]
    fn test_blank_form_has_all_fields() {
        let state = SubmissionState::default();
        let input = FormInput::default();
        let html = render_page(&view(&state, &input, None));

        for field in ["name=\"name\"", "name=\"answer1\"", "name=\"answer2\"", "name=\"answer3\""] {
            assert!(html.contains(field), "missing {field}");
        }
        assert!(html.contains("/?show=1"));
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_warning_keeps_typed_values_escaped() {
        let state = SubmissionState::Collecting {
            warning: Some("answer at least one question".to_string()),
        };
        let input = FormInput {
            name: "<Ana>".to_string(),
            ..FormInput::default()
        };
        let html = render_page(&view(&state, &input, None));

        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("value=\"&lt;Ana&gt;\""));
        assert!(!html.contains("<Ana>"));
    }

    #[test]
    fn test_success_clears_form() {
        let state = SubmissionState::Succeeded {
            rows: 1,
            attempts: 1,
        };
        let input = FormInput {
            name: "Ana".to_string(),
            answer1: "typed".to_string(),
            ..FormInput::default()
        };
        let html = render_page(&view(&state, &input, None));

        assert!(html.contains("class=\"success\""));
        assert!(!html.contains("typed"));
    }

    #[test]
    fn test_failure_shows_reason() {
        let state = SubmissionState::Failed {
            reason: "status 401".to_string(),
        };
        let input = FormInput::default();
        let html = render_page(&view(&state, &input, None));
        assert!(html.contains("class=\"error\""));
        assert!(html.contains("status 401"));
    }

    #[test]
    fn test_answers_table_rows_are_escaped() {
        let table = AnswerTable::from_rows(vec![Submission::from_parts(
            "2024-01-01T00:00:00Z".to_string(),
            "Ana",
            ["<script>".to_string(), String::new(), String::new()],
        )]);
        let state = SubmissionState::default();
        let input = FormInput::default();
        let html = render_page(&view(&state, &input, Some(Ok(&table))));

        assert!(html.contains("<th>pergunta1</th>"));
        assert!(html.contains("<td>Ana</td>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_empty_answers_table() {
        let table = AnswerTable::new();
        let state = SubmissionState::default();
        let input = FormInput::default();
        let html = render_page(&view(&state, &input, Some(Ok(&table))));
        assert!(html.contains("Nenhuma resposta"));
    }

    #[test]
    fn test_answers_unavailable() {
        let state = SubmissionState::default();
        let input = FormInput::default();
        let html = render_page(&view(&state, &input, Some(Err("status 500"))));
        assert!(html.contains("Erro ao acessar o repositório: status 500"));
    }
}
