// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::{Date, OffsetDateTime};

use crate::filter::{FacetField, FilterState, project};
use crate::model::ClientRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelVisibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    Loading,
    NoClients,
    NoMatches,
    Populated,
}

impl EmptyState {
    pub const fn headline(self) -> &'static str {
        match self {
            Self::Loading => "Loading clients...",
            Self::NoClients => "No clients available",
            Self::NoMatches => "No matching clients found",
            Self::Populated => "",
        }
    }

    pub const fn hint(self) -> &'static str {
        match self {
            Self::Loading => "",
            Self::NoClients => "Check back later or add new clients",
            Self::NoMatches => "Try a different search term or reset filters",
            Self::Populated => "",
        }
    }
}

/// View-model for the client directory: the mirror of the last snapshot, the
/// current filter, and the projection derived from both.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientListState {
    pub today: Date,
    pub loading: bool,
    pub active: bool,
    pub filter_panel: PanelVisibility,
    pub status_line: Option<String>,
    mirror: Vec<ClientRecord>,
    filter: FilterState,
    visible: Vec<ClientRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListCommand {
    SetSearch(String),
    ClearSearch,
    ToggleFilterPanel,
    SetFacet(FacetField, String),
    ResetFilters,
    ApplySnapshot(Vec<ClientRecord>),
    StreamFailed(String),
    Deactivate,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    SearchChanged(String),
    FilterPanelChanged(PanelVisibility),
    FacetChanged(FacetField),
    FiltersReset,
    MirrorReplaced { count: usize },
    ProjectionChanged { visible: usize },
    LoadingFinished,
    StatusUpdated(String),
    StatusCleared,
    Deactivated,
}

impl ClientListState {
    pub fn new(today: Date) -> Self {
        Self {
            today,
            loading: true,
            active: true,
            filter_panel: PanelVisibility::Hidden,
            status_line: None,
            mirror: Vec::new(),
            filter: FilterState::default(),
            visible: Vec::new(),
        }
    }

    /// Captures today's local date once; it is not refreshed at midnight.
    pub fn activate() -> Self {
        Self::new(local_today())
    }

    pub fn mirror(&self) -> &[ClientRecord] {
        &self.mirror
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn visible(&self) -> &[ClientRecord] {
        &self.visible
    }

    pub fn is_new(&self, record: &ClientRecord) -> bool {
        record.is_new_on(self.today)
    }

    pub fn empty_state(&self) -> EmptyState {
        if self.loading {
            EmptyState::Loading
        } else if self.mirror.is_empty() {
            EmptyState::NoClients
        } else if self.visible.is_empty() {
            EmptyState::NoMatches
        } else {
            EmptyState::Populated
        }
    }

    pub fn count_label(&self) -> String {
        let count = self.visible.len();
        let noun = if count == 1 { "client" } else { "clients" };
        format!("{count} {noun} found")
    }

    pub fn dispatch(&mut self, command: ListCommand) -> Vec<ListEvent> {
        if !self.active {
            return Vec::new();
        }

        match command {
            ListCommand::SetSearch(term) => {
                self.filter.search_term = term;
                vec![
                    ListEvent::SearchChanged(self.filter.search_term.clone()),
                    self.refilter(),
                ]
            }
            ListCommand::ClearSearch => {
                self.filter.search_term.clear();
                vec![ListEvent::SearchChanged(String::new()), self.refilter()]
            }
            ListCommand::ToggleFilterPanel => {
                self.filter_panel = match self.filter_panel {
                    PanelVisibility::Hidden => PanelVisibility::Visible,
                    PanelVisibility::Visible => PanelVisibility::Hidden,
                };
                vec![ListEvent::FilterPanelChanged(self.filter_panel)]
            }
            ListCommand::SetFacet(field, value) => match self.filter.set_facet(field, &value) {
                Ok(()) => vec![ListEvent::FacetChanged(field), self.refilter()],
                Err(error) => vec![self.set_status(error.to_string())],
            },
            ListCommand::ResetFilters => {
                self.filter.reset();
                vec![
                    ListEvent::FiltersReset,
                    self.refilter(),
                    self.set_status("filters reset"),
                ]
            }
            ListCommand::ApplySnapshot(records) => {
                self.mirror = records;
                let mut events = vec![ListEvent::MirrorReplaced {
                    count: self.mirror.len(),
                }];
                if self.loading {
                    self.loading = false;
                    events.push(ListEvent::LoadingFinished);
                }
                events.push(self.refilter());
                events
            }
            ListCommand::StreamFailed(message) => {
                let mut events = Vec::new();
                if self.loading {
                    self.loading = false;
                    events.push(ListEvent::LoadingFinished);
                }
                events.push(self.set_status(format!("client stream failed: {message}")));
                events
            }
            ListCommand::Deactivate => {
                self.active = false;
                vec![ListEvent::Deactivated]
            }
            ListCommand::SetStatus(message) => vec![self.set_status(message)],
            ListCommand::ClearStatus => {
                self.status_line = None;
                vec![ListEvent::StatusCleared]
            }
        }
    }

    fn refilter(&mut self) -> ListEvent {
        self.visible = project(&self.mirror, &self.filter);
        ListEvent::ProjectionChanged {
            visible: self.visible.len(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) -> ListEvent {
        let message = message.into();
        self.status_line = Some(message.clone());
        ListEvent::StatusUpdated(message)
    }
}

pub fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
