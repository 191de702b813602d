use iced::widget::{button, checkbox, column, container, image, text};
use iced::{ContentFit, Element, Length};
use iced_aw::Wrap;

use matchday_gallery::state::data::{MediaKind, MediaRecord};
use matchday_gallery::state::selection::SelectionManager;

use crate::Message;

const TILE_WIDTH: f32 = 200.0;
const TILE_HEIGHT: f32 = 140.0;

/// Thumbnail grid for the filtered view
pub fn view<'a>(records: &[&'a MediaRecord], selection: &SelectionManager) -> Element<'a, Message> {
    if records.is_empty() {
        return container(text("Nothing here yet.").size(18))
            .width(Length::Fill)
            .center_x(Length::Fill)
            .padding(40)
            .into();
    }

    let tiles: Vec<Element<'a, Message>> = records
        .iter()
        .copied()
        .map(|record| tile(record, selection.is_selected(&record.id)))
        .collect();

    Wrap::with_elements(tiles).spacing(12.0).line_spacing(12.0).into()
}

fn tile<'a>(record: &'a MediaRecord, selected: bool) -> Element<'a, Message> {
    let preview: Element<'a, Message> = match record.kind {
        MediaKind::Photo => image(image::Handle::from_path(&record.url))
            .width(Length::Fixed(TILE_WIDTH))
            .height(Length::Fixed(TILE_HEIGHT))
            .content_fit(ContentFit::Cover)
            .into(),
        MediaKind::Video => container(text("▶ Video").size(20))
            .center_x(Length::Fixed(TILE_WIDTH))
            .center_y(Length::Fixed(TILE_HEIGHT))
            .style(container::rounded_box)
            .into(),
    };

    let id = record.id.clone();
    let mut name = record.display_name();
    if name.chars().count() > 24 {
        name = name.chars().take(23).collect::<String>() + "…";
    }

    column![
        button(preview)
            .padding(0)
            .on_press(Message::Open(record.id.clone())),
        checkbox(name, selected)
            .on_toggle(move |_| Message::ToggleSelect(id.clone()))
            .size(16)
            .text_size(14),
    ]
    .spacing(4)
    .width(Length::Fixed(TILE_WIDTH))
    .into()
}
