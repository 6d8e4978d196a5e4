use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::model::{Browser, UIData};

pub const CMDLINE_HEIGHT: u16 = 1;
pub const COLUMN_SPACING: u16 = 1;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, browser: &Browser, frame: &mut Frame) {
        let uidata = browser.get_uidata();
        let [table_area, cmdline_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(CMDLINE_HEIGHT)])
                .areas(frame.area());

        if uidata.has_table() {
            self.draw_table(uidata, frame, table_area);
        } else {
            Self::draw_empty(frame, table_area);
        }
        Self::draw_cmdline(uidata, frame, cmdline_area);

        if let Some(popup) = &uidata.popup {
            let area = Self::popup_area(frame.area(), 80, 80);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(popup.message.as_str())
                    .wrap(Wrap { trim: false })
                    .block(Block::bordered().title(Line::from(format!(" {} ", popup.title)).bold())),
                area,
            );
        }
    }

    fn draw_empty(frame: &mut Frame, area: Rect) {
        let text = vec![
            Line::from("No dataset loaded."),
            Line::from(vec![
                "Press ".into(),
                "<o>".blue().bold(),
                " to open one, ".into(),
                "<?>".blue().bold(),
                " for help.".into(),
            ]),
        ];
        frame.render_widget(
            Paragraph::new(text)
                .centered()
                .block(Block::bordered().title(Line::from(" dsview ".bold()).centered())),
            area,
        );
    }

    fn truncate(s: &str, width: usize) -> String {
        if s.chars().count() <= width {
            return s.to_string();
        }
        if width < 3 {
            return String::new();
        }
        let mut reduced: String = s.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    }

    fn column_widths(uidata: &UIData) -> Vec<Constraint> {
        let index_width = uidata.index.iter().map(|s| s.len()).max().unwrap_or(1);
        let mut widths = vec![Constraint::Length(index_width as u16)];
        for (cidx, name) in uidata.columns.iter().enumerate() {
            let content = uidata
                .rows
                .iter()
                .filter_map(|r| r.get(cidx))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0);
            let width = std::cmp::max(name.chars().count(), content).min(uidata.max_column_width);
            widths.push(Constraint::Length(width as u16));
        }
        widths
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let max_width = uidata.max_column_width;
        let header = Row::new(
            std::iter::once(Cell::from(""))
                .chain(uidata.columns.iter().map(|c| Cell::from(Self::truncate(c, max_width)))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));

        let rows = uidata.rows.iter().zip(uidata.index.iter()).map(|(row, idx)| {
            Row::new(
                std::iter::once(Cell::from(Span::from(idx.clone()).dark_gray())).chain(
                    row.iter()
                        .map(|value| Cell::from(Self::truncate(value, max_width))),
                ),
            )
        });

        let table = Table::new(rows, Self::column_widths(uidata))
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().yellow().bold())
            .block(
                Block::bordered()
                    .title(Line::from(format!(" {} ", uidata.name)).bold().centered())
                    .title_bottom(Line::from(format!(" {} ", uidata.summary)).centered()),
            );

        // the index occupies the first table column
        self.table_state.select(Some(uidata.selected_row));
        self.table_state.select_column(Some(uidata.selected_column + 1));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        match uidata.cmd_mode {
            Some(mode) => {
                let prompt = mode.prompt();
                let line = Line::from(vec![
                    prompt.blue().bold(),
                    Span::from(uidata.cmdinput.input.clone()),
                ]);
                frame.render_widget(Paragraph::new(line), area);
                let x = area.x + (prompt.len() + uidata.cmdinput.cursor_pos) as u16;
                frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            }
            None => {
                frame.render_widget(Paragraph::new(uidata.status_message.as_str()).italic(), area);
            }
        }
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
            .flex(Flex::Center)
            .areas(area);
        area
    }
}
