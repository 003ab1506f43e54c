use crate::choices::{
    Choice, MenuOption, CLEAN_MENU, FORMAT_MENU, MODE_MENU, STYLE_MENU,
};
use crate::errors::EditError;
use crate::session::{ImageConfiguration, SessionId, SessionStore, Stage};

/// Transport-side events the conversation reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    ImageSubmitted { id: SessionId, image_ref: String },
    ChoiceSelected { id: SessionId, key: String },
    CancelRequested { id: SessionId },
}

/// What the caller should do next after feeding one event in.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Present the next menu to the user.
    Prompt {
        text: &'static str,
        options: &'static [MenuOption],
    },
    /// All required choices are in. The caller runs the pipeline and is
    /// responsible for removing the session afterwards, success or failure.
    Ready {
        config: ImageConfiguration,
        image_ref: String,
    },
    /// Session discarded (explicit cancel; idempotent).
    Cancelled,
}

/// Per-session finite-state machine over the [`SessionStore`].
///
/// Transitions are resolved against the session the event's id names, never
/// a global "current" pointer, so concurrent conversations can't interfere.
#[derive(Debug, Clone)]
pub struct ConversationController {
    store: SessionStore,
}

impl ConversationController {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn handle(&self, event: FlowEvent) -> Result<FlowStep, EditError> {
        match event {
            FlowEvent::ImageSubmitted { id, image_ref } => {
                self.store.create(id, image_ref);
                Ok(prompt_for(Stage::AwaitingMode))
            }
            FlowEvent::CancelRequested { id } => {
                self.store.remove(id);
                Ok(FlowStep::Cancelled)
            }
            FlowEvent::ChoiceSelected { id, key } => {
                let choice = Choice::parse(&key)?;
                self.store
                    .with_session(id, |session| {
                        let stage = session.stage();
                        match (stage, choice) {
                            (Stage::AwaitingMode, Choice::Mode(mode)) => {
                                session.mode = Some(mode);
                                Ok(prompt_for(Stage::AwaitingFormat))
                            }
                            (Stage::AwaitingFormat, Choice::Format(format)) => {
                                session.format = Some(format);
                                next_step(session)
                            }
                            (Stage::AwaitingCleanChoice, Choice::Clean(clean)) => {
                                session.clean_status_bar = Some(clean);
                                next_step(session)
                            }
                            (Stage::AwaitingStyle, Choice::Style(style)) => {
                                session.status_bar_style = Some(style);
                                next_step(session)
                            }
                            // Frame choice is decoration, not a gate: accepted
                            // any time after the mode is known.
                            (stage, Choice::Mockup(device))
                                if !matches!(stage, Stage::AwaitingMode | Stage::Complete) =>
                            {
                                session.mockup_device = Some(device);
                                next_step(session)
                            }
                            (stage, _) => Err(EditError::OutOfOrderChoice {
                                expected: expected_for(stage),
                                got: key.clone(),
                            }),
                        }
                    })?
            }
        }
    }
}

fn next_step(session: &mut crate::session::Session) -> Result<FlowStep, EditError> {
    let stage = session.stage();
    if stage == Stage::Complete {
        Ok(FlowStep::Ready {
            config: session.to_configuration()?,
            image_ref: session.image_ref.clone(),
        })
    } else {
        Ok(prompt_for(stage))
    }
}

fn prompt_for(stage: Stage) -> FlowStep {
    match stage {
        Stage::AwaitingMode => FlowStep::Prompt {
            text: "Got the photo! What should I do with it?",
            options: MODE_MENU,
        },
        Stage::AwaitingFormat => FlowStep::Prompt {
            text: "Which format do you want?",
            options: FORMAT_MENU,
        },
        Stage::AwaitingCleanChoice => FlowStep::Prompt {
            text: "Clean up the status bar?",
            options: CLEAN_MENU,
        },
        Stage::AwaitingStyle => FlowStep::Prompt {
            text: "Which status bar style?",
            options: STYLE_MENU,
        },
        Stage::Complete => FlowStep::Prompt {
            text: "Processing...",
            options: &[],
        },
    }
}

fn expected_for(stage: Stage) -> &'static str {
    match stage {
        Stage::AwaitingMode => "mode",
        Stage::AwaitingFormat => "format",
        Stage::AwaitingCleanChoice => "clean yes/no",
        Stage::AwaitingStyle => "style",
        Stage::Complete => "no further",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::{Mode, OutputFormat, StatusBarStyle};

    fn controller() -> ConversationController {
        ConversationController::new(SessionStore::new())
    }

    fn submit(c: &ConversationController, id: i64) {
        c.handle(FlowEvent::ImageSubmitted {
            id: SessionId(id),
            image_ref: "photo-1".to_string(),
        })
        .unwrap();
    }

    fn choose(c: &ConversationController, id: i64, key: &str) -> Result<FlowStep, EditError> {
        c.handle(FlowEvent::ChoiceSelected {
            id: SessionId(id),
            key: key.to_string(),
        })
    }

    #[test]
    fn logo_flow_completes_after_mode_and_format() {
        let c = controller();
        submit(&c, 1);

        let step = choose(&c, 1, "mode_logo").unwrap();
        assert!(matches!(step, FlowStep::Prompt { options, .. } if options == FORMAT_MENU));

        let step = choose(&c, 1, "format_PNG").unwrap();
        let FlowStep::Ready { config, image_ref } = step else {
            panic!("expected Ready, got {step:?}");
        };
        assert_eq!(config.mode, Mode::Logo);
        assert_eq!(config.format, OutputFormat::Png);
        assert!(!config.clean_status_bar);
        assert_eq!(image_ref, "photo-1");
    }

    #[test]
    fn screenshot_flow_asks_clean_then_style() {
        let c = controller();
        submit(&c, 1);
        choose(&c, 1, "mode_screenshot").unwrap();

        let step = choose(&c, 1, "format_JPEG").unwrap();
        assert!(matches!(step, FlowStep::Prompt { options, .. } if options == CLEAN_MENU));

        let step = choose(&c, 1, "clean_yes").unwrap();
        assert!(matches!(step, FlowStep::Prompt { options, .. } if options == STYLE_MENU));

        let step = choose(&c, 1, "style_ios_dark").unwrap();
        let FlowStep::Ready { config, .. } = step else {
            panic!("expected Ready, got {step:?}");
        };
        assert!(config.clean_status_bar);
        assert_eq!(config.status_bar_style, Some(StatusBarStyle::IosDark));
    }

    #[test]
    fn screenshot_flow_completes_on_clean_no() {
        let c = controller();
        submit(&c, 1);
        choose(&c, 1, "mode_screenshot").unwrap();
        choose(&c, 1, "format_WEBP").unwrap();

        let step = choose(&c, 1, "clean_no").unwrap();
        let FlowStep::Ready { config, .. } = step else {
            panic!("expected Ready, got {step:?}");
        };
        assert!(!config.clean_status_bar);
        assert_eq!(config.status_bar_style, None);
    }

    #[test]
    fn stale_press_is_rejected_and_creates_nothing() {
        let c = controller();
        let err = choose(&c, 9, "mode_logo").unwrap_err();
        assert_eq!(err, EditError::StaleSession(SessionId(9)));
        assert!(c.store().is_empty());
    }

    #[test]
    fn cancel_discards_and_subsequent_press_is_stale() {
        let c = controller();
        submit(&c, 1);
        choose(&c, 1, "mode_screenshot").unwrap();

        let step = c
            .handle(FlowEvent::CancelRequested { id: SessionId(1) })
            .unwrap();
        assert_eq!(step, FlowStep::Cancelled);
        assert!(c.store().is_empty());

        let err = choose(&c, 1, "format_PNG").unwrap_err();
        assert_eq!(err, EditError::StaleSession(SessionId(1)));

        // cancel with nothing in flight is a no-op
        let step = c
            .handle(FlowEvent::CancelRequested { id: SessionId(1) })
            .unwrap();
        assert_eq!(step, FlowStep::Cancelled);
    }

    #[test]
    fn out_of_order_choice_leaves_session_untouched() {
        let c = controller();
        submit(&c, 1);

        let err = choose(&c, 1, "format_PNG").unwrap_err();
        assert!(matches!(
            err,
            EditError::OutOfOrderChoice {
                expected: "mode",
                ..
            }
        ));

        // mode input is still what the session expects
        let step = choose(&c, 1, "mode_rounded").unwrap();
        assert!(matches!(step, FlowStep::Prompt { options, .. } if options == FORMAT_MENU));
    }

    #[test]
    fn mode_is_set_exactly_once() {
        let c = controller();
        submit(&c, 1);
        choose(&c, 1, "mode_logo").unwrap();

        let err = choose(&c, 1, "mode_screenshot").unwrap_err();
        assert!(matches!(
            err,
            EditError::OutOfOrderChoice {
                expected: "format",
                ..
            }
        ));
        let mode = c
            .store()
            .with_session(SessionId(1), |s| s.mode)
            .unwrap();
        assert_eq!(mode, Some(Mode::Logo));
    }

    #[test]
    fn malformed_keys_are_rejected_not_ignored() {
        let c = controller();
        submit(&c, 1);
        let err = choose(&c, 1, "mode_banana").unwrap_err();
        assert_eq!(err, EditError::MalformedChoice("mode_banana".to_string()));
    }

    #[test]
    fn mockup_choice_rides_along_without_gating() {
        let c = controller();
        submit(&c, 1);
        choose(&c, 1, "mode_screenshot").unwrap();

        let step = choose(&c, 1, "mockup_iphone_15_pro").unwrap();
        assert!(matches!(step, FlowStep::Prompt { options, .. } if options == FORMAT_MENU));

        choose(&c, 1, "format_PNG").unwrap();
        let step = choose(&c, 1, "clean_no").unwrap();
        let FlowStep::Ready { config, .. } = step else {
            panic!("expected Ready, got {step:?}");
        };
        assert_eq!(config.mockup_device.as_deref(), Some("iphone_15_pro"));
    }

    #[test]
    fn concurrent_sessions_do_not_interfere() {
        let c = controller();
        submit(&c, 1);
        submit(&c, 2);

        choose(&c, 1, "mode_logo").unwrap();
        choose(&c, 2, "mode_screenshot").unwrap();
        choose(&c, 2, "format_JPEG").unwrap();

        let step = choose(&c, 1, "format_PNG").unwrap();
        let FlowStep::Ready { config, .. } = step else {
            panic!("expected Ready, got {step:?}");
        };
        assert_eq!(config.mode, Mode::Logo);

        // session 2 is still mid-flow
        let step = choose(&c, 2, "clean_no").unwrap();
        assert!(matches!(step, FlowStep::Ready { .. }));
    }
}
