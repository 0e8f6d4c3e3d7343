//! The closed set of school subjects offered in the subject menu.

/// Subjects in menu order.
pub const SUBJECTS: [&str; 14] = [
    "Алгебра",
    "Русский язык",
    "Английский язык",
    "География",
    "Информатика",
    "Обществознание",
    "Окружающий мир",
    "Геометрия",
    "Литература",
    "Биология",
    "История",
    "Физика",
    "Химия",
    "Математика",
];

/// Buttons per keyboard row in the subject menu.
pub const MENU_ROW_WIDTH: usize = 2;

pub fn is_known(name: &str) -> bool {
    SUBJECTS.contains(&name)
}
