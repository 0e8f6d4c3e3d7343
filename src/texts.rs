//! Canned replies and keyboards.

use evrika_core::{
    message::{ButtonPayload, InlineButton, OutgoingMessage},
    subjects::{MENU_ROW_WIDTH, SUBJECTS},
};

pub const REFUSAL: &str = "Извините, Вы не можете воспользоваться Эврикой.";

pub const CONSENT_PROMPT: &str = "Пожалуйста, перед тем, как начать наше образовательное \
путешествие, прочитайте пользовательское соглашение.\n\
https://edpalm.academy/usloviya-predostavleniya-servisa";

pub const ACCEPT_LABEL: &str = "Да";
pub const DECLINE_LABEL: &str = "Нет";

pub const CAPABILITIES: &str = "Дорогой ученик, перед тобой виртуальный помощник образования. \
Чтобы ознакомиться с моими возможностями, нажми на кнопку «Меню».";

pub const SUBJECT_PROMPT: &str = "Пожалуйста, выбери необходимый предмет. Ознакомиться со всеми \
моими возможностями можно, нажав на кнопку «Меню».";

pub const FAQ: &str = "1) Говори точно, что именно тебе нужно:
Например, вместо «Помоги с математикой», лучше сказать «Как решить пример: 3 умножить на 2?». Это поможет мне точно понять, что именно тебе нужно.
2) Задавай по одному вопросу:
Если хочешь узнать не только о животных, но и о том, как решать математические примеры, лучше спросить сначала одно, а потом другое. Например, сначала спроси «Что едят зайцы?» и после ответа спроси «Как сложить 5 и 3?»
3) Проверяй, что написал/-а:
Если пишешь пример или вопрос, убедись, что в нём нет орфографических ошибок. Например, если хочешь спросить про «5 умножить на 2», не пиши «5 ужножить на 2», потому что я могу не понять вопрос.
4) Спрашивай, если что-то непонятно:
Если я объяснила, как решить пример, и тебе что-то непонятно, спроси меня еще раз. Например, я уже рассказала информацию на тему: «Что едят зайцы?», а ты хочешь узнать подробности. Тогда спроси меня, к примеру, «А что именно едят зайцы весной?»
5) Задавай мне много вопросов:
Я всегда рада ответить на любой твой вопрос. Задавай интересующие вопросы снова и снова, ведь учиться – это очень интересно!";

pub const FEEDBACK: &str = "У тебя появились вопросы, пожелания, или ты заметил/-а какую-то \
ошибку? Давай вместе улучшим Эврику!
Напиши нам на почту:
evrika@hss.center";

pub const HELP: &str = "Список доступных команд:
/start - Начать работу с ботом
/faq - Как со мной общаться?
/subject - Выбрать предмет
/feedback - Обратная связь
/help - Список команд";

pub const PROCESSING_APOLOGY: &str = "Извините, произошла ошибка при обработке вашего сообщения.";

pub const STORAGE_APOLOGY: &str = "Извините, произошла ошибка при обращении к базе данных.";

pub fn subject_confirmation(subject: &str) -> String {
    format!("Теперь я буду отвечать на вопросы, связанные с предметом: {subject}")
}

/// Terms link with Yes/No buttons.
pub fn consent_prompt() -> OutgoingMessage {
    OutgoingMessage::with_keyboard(
        CONSENT_PROMPT,
        vec![vec![
            InlineButton::new(ACCEPT_LABEL, ButtonPayload::AcceptTerms),
            InlineButton::new(DECLINE_LABEL, ButtonPayload::DeclineTerms),
        ]],
    )
}

/// One button per subject, `MENU_ROW_WIDTH` to a row.
pub fn subject_menu() -> OutgoingMessage {
    let rows = SUBJECTS
        .chunks(MENU_ROW_WIDTH)
        .map(|row| {
            row.iter()
                .map(|name| InlineButton::new(*name, ButtonPayload::Subject(name.to_string())))
                .collect()
        })
        .collect();
    OutgoingMessage::with_keyboard(SUBJECT_PROMPT, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_prompt_buttons() {
        let msg = consent_prompt();
        assert!(msg.text.contains("https://edpalm.academy/"));
        assert_eq!(msg.button_count(), 2);
        assert_eq!(msg.keyboard[0][0].payload, ButtonPayload::AcceptTerms);
        assert_eq!(msg.keyboard[0][1].payload, ButtonPayload::DeclineTerms);
    }

    #[test]
    fn test_subject_menu_layout() {
        let msg = subject_menu();
        assert_eq!(msg.button_count(), SUBJECTS.len());
        assert_eq!(msg.keyboard.len(), 7);
        assert!(msg.keyboard.iter().all(|row| row.len() == 2));
        assert_eq!(msg.keyboard[0][0].label, "Алгебра");
        assert_eq!(
            msg.keyboard[0][0].payload.as_callback_data(),
            "subject_Алгебра"
        );
        assert_eq!(msg.keyboard[6][1].label, "Математика");
    }

    #[test]
    fn test_subject_confirmation_names_subject() {
        assert!(subject_confirmation("Химия").ends_with("предметом: Химия"));
    }

    #[test]
    fn test_help_lists_every_command() {
        for cmd in ["/start", "/faq", "/subject", "/feedback", "/help"] {
            assert!(HELP.contains(cmd), "{cmd} missing from help");
        }
    }
}
