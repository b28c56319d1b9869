use crate::Screen;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub title: String,
    pub description: String,
}

impl Slide {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

pub fn default_slides() -> Vec<Slide> {
    vec![
        Slide::new(
            "Welcome aboard",
            "Create an account in a minute and pick up where you left off on any device.",
        ),
        Slide::new(
            "Verified by email",
            "We send a one-time code to your inbox so only you can activate the account.",
        ),
        Slide::new(
            "Make it yours",
            "Tell us a little about yourself and we will tailor what you see.",
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselStep {
    Advanced(usize),
    Finished(Screen),
}

/// Welcome carousel: "Next" walks the slides, the last slide's
/// "Get Started" and "Skip" both lead to sign-up.
#[derive(Debug, Clone)]
pub struct OnboardingCarousel {
    slides: Vec<Slide>,
    active_index: usize,
}

impl Default for OnboardingCarousel {
    fn default() -> Self {
        Self {
            slides: default_slides(),
            active_index: 0,
        }
    }
}

impl OnboardingCarousel {
    /// `None` for an empty slide list.
    pub fn new(slides: Vec<Slide>) -> Option<Self> {
        if slides.is_empty() {
            return None;
        }
        Some(Self {
            slides,
            active_index: 0,
        })
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_slide(&self) -> &Slide {
        &self.slides[self.active_index]
    }

    pub fn is_last_slide(&self) -> bool {
        self.active_index + 1 == self.slides.len()
    }

    pub fn primary_label(&self) -> &'static str {
        if self.is_last_slide() {
            "Get Started"
        } else {
            "Next"
        }
    }

    pub fn next(&mut self) -> CarouselStep {
        if self.is_last_slide() {
            return CarouselStep::Finished(Screen::SignUp);
        }
        self.active_index += 1;
        CarouselStep::Advanced(self.active_index)
    }

    /// Mirrors a swipe; out-of-range indices clamp to the last slide.
    pub fn select(&mut self, index: usize) -> usize {
        self.active_index = index.min(self.slides.len() - 1);
        self.active_index
    }

    pub fn skip(&self) -> Screen {
        Screen::SignUp
    }
}
