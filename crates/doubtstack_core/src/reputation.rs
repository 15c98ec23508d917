//! crates/doubtstack_core/src/reputation.rs
//!
//! The fixed point table behind user reputation.

/// Actions that change a user's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationAction {
    QuestionPosted,
    AnswerPosted,
    AnswerAccepted,
    UpvoteReceived,
    DownvoteReceived,
    /// A faculty member verified one of the user's answers.
    BestAnswer,
}

/// The stat counter an action bumps alongside the reputation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCounter {
    QuestionsAsked,
    AnswersGiven,
    BestAnswers,
    HelpfulVotes,
}

impl ReputationAction {
    pub fn points(&self) -> i32 {
        match self {
            ReputationAction::QuestionPosted => 5,
            ReputationAction::AnswerPosted => 10,
            ReputationAction::AnswerAccepted => 25,
            ReputationAction::UpvoteReceived => 5,
            ReputationAction::DownvoteReceived => -2,
            ReputationAction::BestAnswer => 50,
        }
    }

    pub fn stat(&self) -> Option<StatCounter> {
        match self {
            ReputationAction::QuestionPosted => Some(StatCounter::QuestionsAsked),
            ReputationAction::AnswerPosted => Some(StatCounter::AnswersGiven),
            ReputationAction::AnswerAccepted => Some(StatCounter::BestAnswers),
            ReputationAction::UpvoteReceived => Some(StatCounter::HelpfulVotes),
            ReputationAction::DownvoteReceived | ReputationAction::BestAnswer => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationAction::QuestionPosted => "question_posted",
            ReputationAction::AnswerPosted => "answer_posted",
            ReputationAction::AnswerAccepted => "answer_accepted",
            ReputationAction::UpvoteReceived => "upvote_received",
            ReputationAction::DownvoteReceived => "downvote_received",
            ReputationAction::BestAnswer => "best_answer",
        }
    }

    /// Reputation after applying this action to `current`. Never negative.
    pub fn apply(&self, current: i32) -> i32 {
        current.saturating_add(self.points()).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_table() {
        assert_eq!(ReputationAction::QuestionPosted.points(), 5);
        assert_eq!(ReputationAction::AnswerPosted.points(), 10);
        assert_eq!(ReputationAction::AnswerAccepted.points(), 25);
        assert_eq!(ReputationAction::UpvoteReceived.points(), 5);
        assert_eq!(ReputationAction::DownvoteReceived.points(), -2);
        assert_eq!(ReputationAction::BestAnswer.points(), 50);
    }

    #[test]
    fn reputation_never_goes_negative() {
        assert_eq!(ReputationAction::DownvoteReceived.apply(1), 0);
        assert_eq!(ReputationAction::DownvoteReceived.apply(0), 0);
        assert_eq!(ReputationAction::DownvoteReceived.apply(10), 8);
    }

    #[test]
    fn only_counted_actions_touch_stats() {
        assert_eq!(ReputationAction::DownvoteReceived.stat(), None);
        assert_eq!(ReputationAction::BestAnswer.stat(), None);
        assert_eq!(
            ReputationAction::UpvoteReceived.stat(),
            Some(StatCounter::HelpfulVotes)
        );
    }
}
