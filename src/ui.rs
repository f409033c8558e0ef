use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::Line,
    widgets::{Block, Clear, Paragraph, Row, Table, Widget},
};

use std::time::Duration;

use crate::control::CellRef;
use crate::grid::Grid;
use crate::host::{Host, Section};
use crate::model::{Modus, Model};

pub const MIN_COLUMN_WIDTH: u16 = 12;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct TableUI;

/// Header or footer rows of the grid with the mounted controls.
struct CellsView<'a> {
    grid: &'a Grid,
    section: Section,
    focus: usize,
    column_width: u16,
}

impl CellsView<'_> {
    fn cells(&self, column: usize) -> Vec<CellRef> {
        (0..)
            .map_while(|row| self.grid.cell(column, self.section, row))
            .collect()
    }

    /// Rows needed by the tallest column.
    fn height(&self) -> u16 {
        (0..self.grid.column_count())
            .map(|column| {
                self.cells(column)
                    .iter()
                    .map(|cell| {
                        let cell = cell.borrow();
                        let title = if cell.text().is_empty() { 0 } else { 1 };
                        title + cell.height()
                    })
                    .sum::<u16>()
            })
            .max()
            .unwrap_or(0)
    }
}

impl Widget for CellsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for column in 0..self.grid.column_count() {
            let Some(x) = u16::try_from(column)
                .ok()
                .and_then(|c| c.checked_mul(self.column_width))
                .and_then(|offset| offset.checked_add(area.x))
            else {
                break;
            };
            if x >= area.x + area.width {
                break;
            }
            let width = self.column_width.min(area.x + area.width - x).saturating_sub(1);
            let focused = column == self.focus;
            let bottom = area.y + area.height;
            let mut y = area.y;

            for cell in self.cells(column) {
                let cell = cell.borrow();
                if !cell.text().is_empty() && y < bottom {
                    let style = if focused {
                        Style::default().bold().reversed()
                    } else {
                        Style::default().bold()
                    };
                    buf.set_stringn(x, y, cell.text(), width as usize, style);
                    y += 1;
                }
                for wrapper in cell.wrappers() {
                    if y >= bottom {
                        break;
                    }
                    let height = wrapper.height().min(bottom - y);
                    wrapper.render(Rect::new(x, y, width, height), buf, focused);
                    y += height;
                }
            }
        }
    }
}

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let grid = model.grid();
        let area = frame.area();
        let ncols = grid.column_count().max(1) as u16;
        let column_width = (area.width / ncols).max(MIN_COLUMN_WIDTH);

        let header = CellsView {
            grid,
            section: Section::Header,
            focus: model.focus(),
            column_width,
        };
        let footer = CellsView {
            grid,
            section: Section::Footer,
            focus: model.focus(),
            column_width,
        };

        let [title_area, header_area, table_area, footer_area, status_area] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(header.height()),
                Constraint::Min(1),
                Constraint::Length(footer.height()),
                Constraint::Length(STATUSLINE_HEIGHT),
            ])
            .areas(area);

        let mode = if grid.server_side() { " [server-side]" } else { "" };
        frame.render_widget(
            Line::from(format!(" colctl: {}{}", model.name(), mode).bold()),
            title_area,
        );
        frame.render_widget(header, header_area);
        frame.render_widget(self.table(grid, column_width, table_area.height), table_area);
        frame.render_widget(footer, footer_area);
        frame.render_widget(self.statusline(model), status_area);

        if model.modus() == Modus::POPUP {
            let popup_area = centered_rect(60, 50, area);
            frame.render_widget(Clear, popup_area);
            frame.render_widget(
                Paragraph::new(model.help_text()).block(
                    Block::bordered()
                        .title(Line::from(" Help ".bold()).centered())
                        .border_set(border::THICK),
                ),
                popup_area,
            );
        }
    }

    fn table(&self, grid: &Grid, column_width: u16, height: u16) -> Table<'static> {
        let ncols = grid.column_count();
        let rows: Vec<Row> = grid
            .visible_rows()
            .into_iter()
            .take(height as usize)
            .map(|row| Row::new((0..ncols).map(|column| grid.cell_text(row, column))))
            .collect();
        Table::new(rows, vec![Constraint::Length(column_width - 1); ncols]).column_spacing(1)
    }

    fn statusline(&self, model: &Model) -> Line<'static> {
        let message = model.status_message().to_string();
        let mut spans = if model.last_status_message_update().elapsed() < STATUS_MESSAGE_TTL {
            vec![message.yellow()]
        } else {
            vec![message.dim()]
        };
        if model.grid().server_side()
            && let Some(request) = model.grid().last_request()
        {
            spans.push(" | ".into());
            spans.push(request.to_string().dim());
        }
        spans.push(" | <F1> help ".blue().bold());
        Line::from(spans)
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_control::{ColumnControl, ControlOptions};
    use crate::content::{ContentDescriptor, ContentRegistry};
    use crate::grid::GridOptions;
    use std::rc::Rc;

    #[test]
    fn header_shows_titles_and_controls() {
        let grid = Rc::new(Grid::new(
            vec![
                ("Name".to_string(), vec!["Ada".into()]),
                ("City".to_string(), vec!["Oslo".into()]),
            ],
            GridOptions::default(),
        ));
        let host: Rc<dyn Host> = grid.clone();
        let _control = ColumnControl::new(
            host,
            Rc::new(ContentRegistry::builtin()),
            1,
            ControlOptions::default().content(vec![ContentDescriptor::named("search")]),
        )
        .unwrap();

        let view = CellsView {
            grid: &grid,
            section: Section::Header,
            focus: 1,
            column_width: 12,
        };
        assert_eq!(view.height(), 2);

        let area = Rect::new(0, 0, 24, 2);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        assert_eq!(buf[(0, 0)].symbol(), "N");
        assert_eq!(buf[(12, 0)].symbol(), "C");
        assert_eq!(buf[(12, 1)].symbol(), "∋");
        assert_eq!(buf[(0, 1)].symbol(), " ");
    }

    #[test]
    fn very_wide_grids_render_the_columns_that_fit() {
        let grid = Grid::new(
            (0..6000)
                .map(|idx| (format!("C{idx}"), vec![String::new()]))
                .collect(),
            GridOptions::default(),
        );
        let view = CellsView {
            grid: &grid,
            section: Section::Header,
            focus: 0,
            column_width: MIN_COLUMN_WIDTH,
        };

        let area = Rect::new(0, 0, u16::MAX, 1);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        assert_eq!(buf[(0, 0)].symbol(), "C");
        assert_eq!(buf[(MIN_COLUMN_WIDTH * 5461, 0)].symbol(), "C");
    }
}
