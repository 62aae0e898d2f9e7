//! Reader reviews. A review stays hidden until staff approve it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use inkwell_catalog::ProductId;
use inkwell_core::{DomainError, Entity, UserId};

pub type ReviewId = u64;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub author: UserId,
    /// Shown next to the review; never the full email.
    pub author_name: String,
    pub rating: u8,
    pub title: String,
    pub body: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    pub title: String,
    pub body: String,
}

impl NewReview {
    fn validate(&self) -> Result<(), DomainError> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(DomainError::validation(format!(
                "rating must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("review title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::validation(format!(
                "review title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::validation("review text is required"));
        }
        Ok(())
    }
}

/// Approved-review figures for one product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: usize,
    /// Rounded to one decimal; `None` until a review is approved.
    pub average: Option<f64>,
}

/// Every review in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewBook {
    reviews: Vec<Review>,
    next_id: ReviewId,
}

impl ReviewBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ReviewId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.id == id)
    }

    /// One review per reader per book.
    pub fn submit(
        &mut self,
        product_id: ProductId,
        author: UserId,
        author_name: &str,
        review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<&Review, DomainError> {
        review.validate()?;
        if self.reviews.iter().any(|r| r.product_id == product_id && r.author == author) {
            return Err(DomainError::conflict("you have already reviewed this book"));
        }

        self.next_id += 1;
        let index = self.reviews.len();
        self.reviews.push(Review {
            id: self.next_id,
            product_id,
            author,
            author_name: author_name.to_string(),
            rating: review.rating,
            title: review.title.trim().to_string(),
            body: review.body.trim().to_string(),
            approved: false,
            created_at: now,
        });
        Ok(&self.reviews[index])
    }

    pub fn approve(&mut self, id: ReviewId) -> Result<&Review, DomainError> {
        let review = self
            .reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(DomainError::NotFound)?;
        review.approved = true;
        Ok(&*review)
    }

    /// Rejected reviews are deleted.
    pub fn reject(&mut self, id: ReviewId) -> Result<Review, DomainError> {
        let index = self
            .reviews
            .iter()
            .position(|r| r.id == id)
            .ok_or(DomainError::NotFound)?;
        Ok(self.reviews.remove(index))
    }

    /// Approved reviews of a book, newest first.
    pub fn approved_for(&self, product_id: ProductId, limit: usize) -> Vec<&Review> {
        let mut out: Vec<&Review> = self
            .reviews
            .iter()
            .filter(|r| r.approved && r.product_id == product_id)
            .collect();
        newest_first(&mut out);
        out.truncate(limit);
        out
    }

    /// The moderation queue, newest first.
    pub fn pending(&self) -> Vec<&Review> {
        self.with_status(false)
    }

    pub fn approved(&self) -> Vec<&Review> {
        self.with_status(true)
    }

    fn with_status(&self, approved: bool) -> Vec<&Review> {
        let mut out: Vec<&Review> = self.reviews.iter().filter(|r| r.approved == approved).collect();
        newest_first(&mut out);
        out
    }

    pub fn summary(&self, product_id: ProductId) -> RatingSummary {
        let ratings: Vec<u32> = self
            .reviews
            .iter()
            .filter(|r| r.approved && r.product_id == product_id)
            .map(|r| u32::from(r.rating))
            .collect();
        let average = match ratings.len() {
            0 => None,
            n => {
                let mean = f64::from(ratings.iter().sum::<u32>()) / n as f64;
                Some((mean * 10.0).round() / 10.0)
            }
        };
        RatingSummary {
            count: ratings.len(),
            average,
        }
    }
}

fn newest_first(reviews: &mut [&Review]) {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// Public name for a reviewer: the local part of their email.
pub fn display_name(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split_once('@'))
        .map(|(local, _)| local.trim())
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Reader".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use inkwell_core::AggregateId;

    fn review(rating: u8) -> NewReview {
        NewReview {
            rating,
            title: " Haunting ".into(),
            body: "Read it in one sitting.".into(),
        }
    }

    #[test]
    fn submit_validates_and_starts_pending() {
        let now = Utc::now();
        let book = ProductId::new(AggregateId::new());
        let mut reviews = ReviewBook::new();

        for bad in [0, 6] {
            assert!(matches!(
                reviews.submit(book, UserId::new(), "asha", review(bad), now),
                Err(DomainError::Validation(_))
            ));
        }
        let mut blank = review(4);
        blank.body = "   ".into();
        assert!(reviews.submit(book, UserId::new(), "asha", blank, now).is_err());

        let r = reviews.submit(book, UserId::new(), "asha", review(4), now).unwrap();
        assert_eq!(r.title, "Haunting");
        assert!(!r.approved);
        assert!(reviews.approved_for(book, 10).is_empty());
        assert_eq!(reviews.pending().len(), 1);
    }

    #[test]
    fn one_review_per_reader_per_book() {
        let now = Utc::now();
        let book = ProductId::new(AggregateId::new());
        let other = ProductId::new(AggregateId::new());
        let reader = UserId::new();
        let mut reviews = ReviewBook::new();

        reviews.submit(book, reader, "asha", review(5), now).unwrap();
        assert!(matches!(
            reviews.submit(book, reader, "asha", review(3), now),
            Err(DomainError::Conflict(_))
        ));
        reviews.submit(other, reader, "asha", review(3), now).unwrap();
    }

    #[test]
    fn only_approved_reviews_count() {
        let now = Utc::now();
        let book = ProductId::new(AggregateId::new());
        let mut reviews = ReviewBook::new();
        let a = reviews.submit(book, UserId::new(), "a", review(5), now - Duration::days(2)).unwrap().id;
        let b = reviews.submit(book, UserId::new(), "b", review(4), now - Duration::days(1)).unwrap().id;
        let c = reviews.submit(book, UserId::new(), "c", review(1), now).unwrap().id;

        assert_eq!(reviews.summary(book), RatingSummary { count: 0, average: None });

        reviews.approve(a).unwrap();
        reviews.approve(b).unwrap();
        let summary = reviews.summary(book);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));

        let ids: Vec<_> = reviews.approved_for(book, 10).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(reviews.approved_for(book, 1).len(), 1);

        assert_eq!(reviews.approved().len(), 2);
        assert_eq!(reviews.reject(c).map(|r| r.id), Ok(c));
        assert!(reviews.pending().is_empty());
        assert_eq!(reviews.approve(c).map(|r| r.id), Err(DomainError::NotFound));
    }

    #[test]
    fn display_name_hides_the_domain() {
        assert_eq!(display_name(Some("asha.rao@example.com")), "asha.rao");
        assert_eq!(display_name(Some("@example.com")), "Reader");
        assert_eq!(display_name(None), "Reader");
    }
}
