//! Headless model of the behaviour attached to rendered BBCode.
//!
//! [`MountedContent::mount`] scans rendered HTML for the interactive pieces
//! (spoiler boxes, inline spoilers, image map regions, links and lazy
//! images) and then reacts to [`MountEvent`]s the way the page script does.
//! Once disposed, a mount ignores every event.

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::bbcode::tags;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct SpoilerBox {
    pub title: String,
    pub body_html: String,
    expanded: bool,
}

impl SpoilerBox {
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineSpoiler {
    pub text: String,
    revealed: bool,
}

impl InlineSpoiler {
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapRegion {
    /// Index of the image map this region belongs to.
    pub map: usize,
    /// `None` for informational regions.
    pub href: Option<String>,
    pub title: String,
    pub style: String,
    highlighted: bool,
}

impl MapRegion {
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LazyImage {
    pub src: String,
    loaded: bool,
    observed: bool,
}

impl LazyImage {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub external: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Space,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountEvent {
    SpoilerboxClick(usize),
    SpoilerboxKey(usize, Key),
    SpoilerClick(usize),
    SpoilerHover(usize),
    RegionEnter(usize),
    RegionLeave(usize),
    RegionClick(usize),
    LinkClick(usize),
    ImageVisible(usize),
}

/// What the host should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEffect {
    None,
    Toggled { index: usize, expanded: bool },
    Revealed(usize),
    Highlight { region: usize, on: bool },
    PreventDefault,
    Navigate { url: String, new_tab: bool },
    LoadImage { index: usize, src: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleEvent {
    pub index: usize,
    pub expanded: bool,
}

pub type ListenerId = u64;

type ToggleListener = Box<dyn Fn(&ToggleEvent) + Send + Sync>;

pub struct MountedContent {
    spoilerboxes: Vec<SpoilerBox>,
    spoilers: Vec<InlineSpoiler>,
    regions: Vec<MapRegion>,
    images: Vec<LazyImage>,
    links: Vec<Link>,
    listeners: Vec<(ListenerId, ToggleListener)>,
    next_listener: ListenerId,
    disposed: bool,
}

impl std::fmt::Debug for MountedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedContent")
            .field("spoilerboxes", &self.spoilerboxes)
            .field("spoilers", &self.spoilers)
            .field("regions", &self.regions)
            .field("images", &self.images)
            .field("links", &self.links)
            .field("listeners", &self.listeners.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn has_class(element: ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

impl MountedContent {
    pub fn mount(html: &str) -> Result<Self> {
        let fragment = Html::parse_fragment(html);

        let box_selector = Selector::parse(".js-spoilerbox")?;
        let box_title_selector = Selector::parse(".js-spoilerbox__link")?;
        let box_body_selector = Selector::parse(".js-spoilerbox__body")?;
        let spoilerboxes = fragment
            .select(&box_selector)
            .map(|element| SpoilerBox {
                title: element
                    .select(&box_title_selector)
                    .next()
                    .map(text_of)
                    .unwrap_or_default(),
                body_html: element
                    .select(&box_body_selector)
                    .next()
                    .map(|body| body.inner_html())
                    .unwrap_or_default(),
                expanded: false,
            })
            .collect_vec();

        let spoiler_selector = Selector::parse("span.spoiler")?;
        let spoilers = fragment
            .select(&spoiler_selector)
            .map(|element| InlineSpoiler {
                text: text_of(element),
                revealed: false,
            })
            .collect_vec();

        let map_selector = Selector::parse(".imagemap")?;
        let region_selector = Selector::parse(".imagemap__link")?;
        let regions = fragment
            .select(&map_selector)
            .enumerate()
            .flat_map(|(map, element)| {
                element
                    .select(&region_selector)
                    .map(move |region| {
                        let attr = |name: &str| region.value().attr(name).unwrap_or_default();
                        MapRegion {
                            map,
                            href: Some(attr("href"))
                                .filter(|href| !href.is_empty() && *href != "#")
                                .map(str::to_string),
                            title: attr("title").to_string(),
                            style: attr("style").to_string(),
                            highlighted: false,
                        }
                    })
                    .collect_vec()
            })
            .collect_vec();

        let image_selector = Selector::parse("img[data-src]")?;
        let images = fragment
            .select(&image_selector)
            .filter_map(|element| element.value().attr("data-src"))
            .map(|src| LazyImage {
                src: src.to_string(),
                loaded: false,
                observed: true,
            })
            .collect_vec();

        let link_selector = Selector::parse("a[href]")?;
        let links = fragment
            .select(&link_selector)
            .filter(|element| !has_class(*element, "imagemap__link"))
            .filter_map(|element| element.value().attr("href"))
            .map(|href| Link {
                href: href.to_string(),
                external: tags::is_external(href),
            })
            .collect_vec();

        debug!(
            spoilerboxes = spoilerboxes.len(),
            spoilers = spoilers.len(),
            regions = regions.len(),
            images = images.len(),
            links = links.len(),
            "mounted bbcode content"
        );
        Ok(Self {
            spoilerboxes,
            spoilers,
            regions,
            images,
            links,
            listeners: Vec::new(),
            next_listener: 1,
            disposed: false,
        })
    }

    /// Dispose the current wiring and mount new content in its place.
    pub fn remount(&mut self, html: &str) -> Result<()> {
        self.dispose();
        *self = Self::mount(html)?;
        Ok(())
    }

    /// Detach every listener and observer. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.listeners.clear();
        for image in &mut self.images {
            image.observed = false;
        }
        self.disposed = true;
        debug!("disposed bbcode content");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn spoilerboxes(&self) -> &[SpoilerBox] {
        &self.spoilerboxes
    }

    pub fn spoilers(&self) -> &[InlineSpoiler] {
        &self.spoilers
    }

    pub fn regions(&self) -> &[MapRegion] {
        &self.regions
    }

    pub fn images(&self) -> &[LazyImage] {
        &self.images
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// `aria-expanded` value of a spoiler box toggle.
    pub fn aria_expanded(&self, index: usize) -> Option<&'static str> {
        self.spoilerboxes
            .get(index)
            .map(|b| if b.expanded { "true" } else { "false" })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Images still waiting to become visible.
    pub fn observer_count(&self) -> usize {
        self.images.iter().filter(|i| i.observed).count()
    }

    /// Subscribe to spoiler box toggles. Ignored once disposed.
    pub fn on_toggle(&mut self, listener: impl Fn(&ToggleEvent) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        if !self.disposed {
            self.listeners.push((id, Box::new(listener)));
        }
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, event: MountEvent) -> MountEffect {
        if self.disposed {
            return MountEffect::None;
        }
        match event {
            MountEvent::SpoilerboxClick(index)
            | MountEvent::SpoilerboxKey(index, Key::Enter | Key::Space) => self.toggle(index),
            MountEvent::SpoilerboxKey(_, Key::Other) => MountEffect::None,
            MountEvent::SpoilerClick(index) | MountEvent::SpoilerHover(index) => {
                match self.spoilers.get_mut(index) {
                    Some(spoiler) if !spoiler.revealed => {
                        spoiler.revealed = true;
                        MountEffect::Revealed(index)
                    }
                    _ => MountEffect::None,
                }
            }
            MountEvent::RegionEnter(index) => self.highlight(index, true),
            MountEvent::RegionLeave(index) => self.highlight(index, false),
            MountEvent::RegionClick(index) => match self.regions.get(index) {
                Some(MapRegion {
                    href: Some(url), ..
                }) => MountEffect::Navigate {
                    url: url.clone(),
                    new_tab: tags::is_external(url),
                },
                Some(_) => MountEffect::PreventDefault,
                None => MountEffect::None,
            },
            MountEvent::LinkClick(index) => match self.links.get(index) {
                Some(link) => MountEffect::Navigate {
                    url: link.href.clone(),
                    new_tab: link.external,
                },
                None => MountEffect::None,
            },
            MountEvent::ImageVisible(index) => match self.images.get_mut(index) {
                Some(image) if image.observed && !image.loaded => {
                    image.loaded = true;
                    image.observed = false;
                    MountEffect::LoadImage {
                        index,
                        src: image.src.clone(),
                    }
                }
                _ => MountEffect::None,
            },
        }
    }

    fn toggle(&mut self, index: usize) -> MountEffect {
        let Some(spoilerbox) = self.spoilerboxes.get_mut(index) else {
            return MountEffect::None;
        };
        spoilerbox.expanded = !spoilerbox.expanded;
        let event = ToggleEvent {
            index,
            expanded: spoilerbox.expanded,
        };
        for (_, listener) in &self.listeners {
            listener(&event);
        }
        MountEffect::Toggled {
            index,
            expanded: event.expanded,
        }
    }

    fn highlight(&mut self, index: usize, on: bool) -> MountEffect {
        match self.regions.get_mut(index) {
            Some(region) => {
                region.highlighted = on;
                MountEffect::Highlight { region: index, on }
            }
            None => MountEffect::None,
        }
    }
}

impl Drop for MountedContent {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::bbcode::render::to_html;

    const SAMPLE: &str = "[spoilerbox]hidden [b]text[/b][/spoilerbox]\n\
        [spoiler]ending[/spoiler] [url=https://osu.ppy.sh]osu[/url] [url=/home]home[/url]\n\
        [img]https://example.com/a.png[/img]\n\
        [imagemap]\nhttps://example.com/map.png\n10 10 30 20 https://example.com Title\n50 50 10 10 # Info\n[/imagemap]";

    fn mounted() -> MountedContent {
        MountedContent::mount(&to_html(SAMPLE)).unwrap()
    }

    #[test]
    fn finds_interactive_parts() {
        let content = mounted();
        assert_eq!(content.spoilerboxes().len(), 1);
        assert_eq!(content.spoilerboxes()[0].title, "SPOILER");
        assert_eq!(
            content.spoilerboxes()[0].body_html,
            "hidden <strong>text</strong>"
        );
        assert_eq!(content.spoilers().len(), 1);
        assert_eq!(content.regions().len(), 2);
        assert_eq!(content.images().len(), 2);
        assert_eq!(
            content.links(),
            [
                Link {
                    href: "https://osu.ppy.sh".to_string(),
                    external: true
                },
                Link {
                    href: "/home".to_string(),
                    external: false
                },
            ]
        );
        assert_eq!(content.observer_count(), 2);
    }

    #[test]
    fn spoilerbox_toggles_and_notifies() {
        let mut content = mounted();
        let toggles = Arc::new(AtomicUsize::new(0));
        let counter = toggles.clone();
        content.on_toggle(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(content.aria_expanded(0), Some("false"));
        assert_eq!(
            content.dispatch(MountEvent::SpoilerboxClick(0)),
            MountEffect::Toggled {
                index: 0,
                expanded: true
            }
        );
        assert_eq!(content.aria_expanded(0), Some("true"));
        content.dispatch(MountEvent::SpoilerboxKey(0, Key::Space));
        assert!(!content.spoilerboxes()[0].is_expanded());
        content.dispatch(MountEvent::SpoilerboxKey(0, Key::Enter));
        assert_eq!(
            content.dispatch(MountEvent::SpoilerboxKey(0, Key::Other)),
            MountEffect::None
        );
        assert!(content.spoilerboxes()[0].is_expanded());
        assert_eq!(toggles.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn inline_spoiler_reveals_once() {
        let mut content = mounted();
        assert_eq!(
            content.dispatch(MountEvent::SpoilerHover(0)),
            MountEffect::Revealed(0)
        );
        assert_eq!(content.dispatch(MountEvent::SpoilerClick(0)), MountEffect::None);
        assert!(content.spoilers()[0].is_revealed());
    }

    #[test]
    fn imagemap_regions() {
        let mut content = mounted();
        assert_eq!(
            content.dispatch(MountEvent::RegionEnter(0)),
            MountEffect::Highlight { region: 0, on: true }
        );
        assert!(content.regions()[0].is_highlighted());
        content.dispatch(MountEvent::RegionLeave(0));
        assert!(!content.regions()[0].is_highlighted());

        assert_eq!(
            content.dispatch(MountEvent::RegionClick(0)),
            MountEffect::Navigate {
                url: "https://example.com".to_string(),
                new_tab: true
            }
        );
        assert_eq!(
            content.dispatch(MountEvent::RegionClick(1)),
            MountEffect::PreventDefault
        );
        assert_eq!(content.regions()[1].title, "Info");
    }

    #[test]
    fn lazy_image_loads_once() {
        let mut content = mounted();
        assert_eq!(
            content.dispatch(MountEvent::ImageVisible(0)),
            MountEffect::LoadImage {
                index: 0,
                src: "https://example.com/a.png".to_string()
            }
        );
        assert_eq!(content.dispatch(MountEvent::ImageVisible(0)), MountEffect::None);
        assert_eq!(content.observer_count(), 1);
    }

    #[test]
    fn dispose_detaches_everything() {
        let mut content = mounted();
        content.on_toggle(|_| {});
        assert_eq!(content.listener_count(), 1);

        content.dispose();
        assert!(content.is_disposed());
        assert_eq!(content.listener_count(), 0);
        assert_eq!(content.observer_count(), 0);
        assert_eq!(
            content.dispatch(MountEvent::SpoilerboxClick(0)),
            MountEffect::None
        );
        assert!(!content.spoilerboxes()[0].is_expanded());
        content.on_toggle(|_| {});
        assert_eq!(content.listener_count(), 0);
    }

    #[test]
    fn remount_replaces_content() {
        let mut content = mounted();
        content.on_toggle(|_| {});
        content.remount(&to_html("[spoiler]a[/spoiler][spoiler]b[/spoiler]")).unwrap();
        assert!(!content.is_disposed());
        assert_eq!(content.listener_count(), 0);
        assert!(content.spoilerboxes().is_empty());
        assert_eq!(content.spoilers().len(), 2);
    }

    #[test]
    fn uppercase_scheme_link_opens_new_tab() {
        let mut content = MountedContent::mount(&to_html("[url=HTTPS://example.com]x[/url]")).unwrap();
        assert_eq!(content.links().len(), 1);
        assert!(content.links()[0].external);
        assert_eq!(
            content.dispatch(MountEvent::LinkClick(0)),
            MountEffect::Navigate {
                url: "HTTPS://example.com".to_string(),
                new_tab: true,
            }
        );
    }

    #[test]
    fn out_of_range_events_are_ignored() {
        let mut content = MountedContent::mount("<p>plain</p>").unwrap();
        assert_eq!(content.dispatch(MountEvent::LinkClick(3)), MountEffect::None);
        assert_eq!(content.dispatch(MountEvent::ImageVisible(0)), MountEffect::None);
    }
}
