use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::{Frame, Terminal};
// Use Popup from tui-widgets to render modals
use tui_widgets::popup::Popup;

use crate::config::RgbColor;
use crate::contact::{headers_to_text, visible_columns};

use super::app::App;
use super::edit::{EditForm, FormField};
use super::panes::Pane;
use super::search_box::SEARCH_PLACEHOLDER;

const EDIT_ACTION: &str = "[Edit]";
const ADD_BUTTON: &str = " Add ";
const SAVE_BUTTON: &str = "[ Save ]";
const FORM_LABEL_WIDTH: usize = 12;

const TABLE_HELP: &str = "a: add  e/Enter: edit  /: search  Esc: clear search  ?: help  q: quit";
const SEARCH_HELP: &str = "Type to filter  Esc/Enter: back to table";
const FORM_HELP: &str = "Tab: next field  Enter: next/save  Esc: cancel";
const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_search(frame, layout[0], app);
    draw_table(frame, layout[1], app);
    draw_footer(frame, layout[2], app);
    draw_form_modal(frame, size, app);
    draw_help_modal(frame, size, app);
}

fn draw_search(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let active = app.focus == Pane::Search && app.form.is_none() && app.help_modal.is_none();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(
            format!(" {} ", Pane::Search.title()),
            header_text_style(app),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let value = app.search.value();
    let line = if value.is_empty() {
        Line::from(Span::styled(SEARCH_PLACEHOLDER, placeholder_style(app)))
    } else {
        Line::from(value.to_string())
    };
    frame.render_widget(Paragraph::new(line), inner);

    if active {
        let x = inner.x.saturating_add(app.search.visual_cursor() as u16);
        frame.set_cursor_position((x, inner.y));
    }
}

/// Build the whole table from the view model on every frame.
fn draw_table(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let table = &app.table;
    let active = app.focus == Pane::Table;
    let title = format!(
        " {} {}/{} ",
        Pane::Table.title(),
        table.visible().len(),
        table.contacts().len()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(title, header_text_style(app)));

    if table.visible().is_empty() {
        let message = if table.filter().is_empty() {
            "No contacts. Press a to add one.".to_string()
        } else {
            format!("No contacts match \"{}\"", table.filter())
        };
        frame.render_widget(
            Paragraph::new(Span::styled(message, placeholder_style(app))).block(block),
            area,
        );
        return;
    }

    let columns = visible_columns(table.headers());
    let header_style = header_text_style(app).add_modifier(Modifier::BOLD);
    let mut header_cells: Vec<Cell> = headers_to_text(table.headers(), true)
        .into_iter()
        .map(|text| Cell::from(text.to_string()))
        .collect();
    header_cells.push(Cell::from(""));
    let header = Row::new(header_cells).style(header_style);

    let rows: Vec<Row> = table
        .visible()
        .iter()
        .map(|contact| {
            let fields = contact.to_strings();
            let mut cells: Vec<Cell> = columns
                .iter()
                .map(|&idx| Cell::from(fields[idx].clone()))
                .collect();
            cells.push(Cell::from(Span::styled(EDIT_ACTION, header_text_style(app))));
            Row::new(cells)
        })
        .collect();

    let mut widths: Vec<Constraint> = columns.iter().map(|&idx| column_width(idx)).collect();
    widths.push(Constraint::Length(EDIT_ACTION.len() as u16));

    let widget = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(2)
        .highlight_style(selection_style(app))
        .highlight_symbol("> ");

    let mut state = TableState::default();
    state.select(table.selected());
    frame.render_stateful_widget(widget, area, &mut state);
}

fn column_width(idx: usize) -> Constraint {
    match idx {
        0 => Constraint::Length(6),
        1 | 2 => Constraint::Percentage(25),
        _ => Constraint::Min(10),
    }
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let message = if app.form.is_some() {
        FORM_HELP.to_string()
    } else if app.help_modal.is_some() {
        HELP_MODAL_FOOTER.to_string()
    } else {
        let hint = match app.focus {
            Pane::Search => SEARCH_HELP,
            Pane::Table => TABLE_HELP,
        };
        match &app.status {
            Some(status) => format!("{}  |  {}", status, hint),
            None => hint.to_string(),
        }
    };

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    let line = Line::from(vec![
        Span::styled(ADD_BUTTON, selection_style(app).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(message, style),
    ]);
    frame.render_widget(Paragraph::new(line).style(style), area);
}

fn draw_form_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(form) = app.form.as_ref() else {
        return;
    };

    let lines = form_lines(form, app);
    let title_line = Line::from(Span::styled(form.title(), header_text_style(app)));
    let popup = Popup::new(Text::from(lines))
        .title(title_line)
        .border_style(border_style(app, true));

    let focus = form.focus();
    let cursor = form.input(focus).map(|input| input.visual_cursor());
    let row = FormField::INPUTS.iter().position(|f| *f == focus);

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);

    if let (Some(popup_area), Some(cursor), Some(row)) = (app.modal_popup.area(), cursor, row) {
        let inner = Block::default().borders(Borders::ALL).inner(*popup_area);
        let x = inner
            .x
            .saturating_add(FORM_LABEL_WIDTH as u16)
            .saturating_add(cursor as u16);
        let y = inner.y.saturating_add(row as u16);
        frame.set_cursor_position((x, y));
    }
}

fn form_lines(form: &EditForm, app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for field in FormField::INPUTS {
        let label = format!("{:<width$}", format!("{}:", field.placeholder()), width = FORM_LABEL_WIDTH);
        let value = form.input(field).map(|input| input.value()).unwrap_or_default();
        let value_span = if value.is_empty() {
            Span::styled(field.placeholder().to_string(), placeholder_style(app))
        } else {
            Span::raw(value.to_string())
        };
        // keep the popup wide enough to type into
        let padding = " ".repeat(32usize.saturating_sub(value.chars().count().max(field.placeholder().len())));
        lines.push(Line::from(vec![
            Span::styled(label, header_text_style(app)),
            value_span,
            Span::raw(padding),
        ]));
    }
    lines.push(Line::from(""));

    let save_style = if form.focus() == FormField::Save {
        selection_style(app)
    } else {
        header_text_style(app)
    };
    lines.push(Line::from(Span::styled(SAVE_BUTTON, save_style)));
    lines
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    let mut all_lines: Vec<Line<'static>> = Vec::new();
    for (idx, section) in app.help_entries().iter().enumerate() {
        if idx > 0 {
            all_lines.push(Line::from(""));
        }
        all_lines.push(Line::from(Span::styled(
            section.title.to_string(),
            header_text_style(app).add_modifier(Modifier::BOLD),
        )));
        for entry in &section.entries {
            all_lines.push(Line::from(vec![
                Span::raw(format!("  {:<16}", entry.action)),
                Span::styled(entry.keys.clone(), header_text_style(app)),
            ]));
        }
    }

    // popup borders take two rows, the footer one more
    let viewport = area.height.saturating_sub(4).max(1) as usize;
    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.viewport_height = viewport;
    modal.total_lines = all_lines.len();
    let visible: Vec<Line<'static>> = all_lines
        .into_iter()
        .skip(modal.scroll)
        .take(viewport)
        .collect();

    let title_line = Line::from(Span::styled("HELP", header_text_style(app)));
    let popup = Popup::new(Text::from(visible))
        .title(title_line)
        .border_style(border_style(app, true));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App, active: bool) -> Style {
    let colors = app.ui_colors();
    let style = Style::default().fg(color(colors.border));
    if active {
        style.add_modifier(Modifier::BOLD)
    } else {
        style.add_modifier(Modifier::DIM)
    }
}

fn header_text_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.header))
}

fn placeholder_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.placeholder))
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contact::Contact;
    use crate::db::Database;
    use ratatui::backend::TestBackend;
    use std::path::PathBuf;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_renders_headers_rows_and_edit_column() {
        let mut db = Database::open_in_memory().unwrap();
        db.save(&Contact::new("Ann", "Lee", "x")).unwrap();
        db.save(&Contact::new("Bo", "Kim", "y")).unwrap();
        let config = Config::defaults(PathBuf::from("test.toml")).unwrap();
        let mut app = App::new(&mut db, &config).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        render(&mut terminal, &mut app).unwrap();
        let text = buffer_text(&terminal);

        for expected in ["Search", "ID", "First name", "Last name", "Comment", "Ann", "Kim", EDIT_ACTION, "Add"] {
            assert!(text.contains(expected), "missing {expected:?} in\n{text}");
        }
    }

    #[test]
    fn test_renders_empty_filter_message() {
        let mut db = Database::open_in_memory().unwrap();
        let config = Config::defaults(PathBuf::from("test.toml")).unwrap();
        let mut app = App::new(&mut db, &config).unwrap();
        app.table.set_filter("zzz");

        let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
        render(&mut terminal, &mut app).unwrap();
        assert!(buffer_text(&terminal).contains("No contacts match \"zzz\""));
    }
}
