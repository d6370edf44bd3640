//! Entity resolution: decides for every movie and credited person whether it
//! already exists, was seen earlier in this run, or is new, and allocates
//! surrogate ids for the new ones.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::catalog::existing::{ExistingMovieIndex, ExistingPeopleIndex};
use crate::catalog::records::{Gender, MovieRecord, PersonRef, RoleCode};
use crate::normalization::country::CountryResolver;
use crate::resolve::keys::PersonKey;
use crate::resolve::stats::RunStats;

/// Next surrogate ids to hand out. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierCounters {
    next_movie: i64,
    next_person: i64,
}

impl IdentifierCounters {
    pub fn new(movie_seed: i64, person_seed: i64) -> Self {
        Self {
            next_movie: movie_seed,
            next_person: person_seed,
        }
    }

    pub fn next_movie_id(&self) -> i64 {
        self.next_movie
    }

    pub fn next_person_id(&self) -> i64 {
        self.next_person
    }

    fn allocate_movie(&mut self) -> i64 {
        let id = self.next_movie;
        self.next_movie += 1;
        id
    }

    fn allocate_person(&mut self) -> i64 {
        let id = self.next_person;
        self.next_person += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub id: i64,
    pub title: String,
    pub country: String,
    pub year: i32,
    pub runtime: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonRow {
    pub id: i64,
    pub first_name: String,
    pub surname: String,
    pub born: i32,
    pub died: Option<i32>,
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditRow {
    pub movie_id: i64,
    pub person_id: i64,
    pub role: RoleCode,
}

/// Everything that has to be written for one newly inserted movie, each list
/// in first-encountered order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMovie {
    pub movie: MovieRow,
    pub people: Vec<PersonRow>,
    pub credits: Vec<CreditRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovieResolution {
    /// Already present under this id; nothing is written.
    Skipped { existing_id: i64 },
    Inserted(ResolvedMovie),
}

/// How a credited person was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonResolution {
    /// Same upstream id seen earlier in this run.
    Cached(i64),
    /// Same name found in the people index.
    Known(i64),
    /// Freshly allocated.
    New(i64),
}

impl PersonResolution {
    pub fn id(self) -> i64 {
        match self {
            PersonResolution::Cached(id)
            | PersonResolution::Known(id)
            | PersonResolution::New(id) => id,
        }
    }
}

/// Owns all run state: both indices, the upstream-id cache, the id counters
/// and the outcome counters. Movies must be fed in input order.
#[derive(Debug)]
pub struct ResolutionEngine {
    movies: ExistingMovieIndex,
    people: ExistingPeopleIndex,
    run_cache: HashMap<i64, i64>,
    counters: IdentifierCounters,
    countries: CountryResolver,
    max_cast: usize,
    stats: RunStats,
}

impl ResolutionEngine {
    pub fn new(
        movies: ExistingMovieIndex,
        people: ExistingPeopleIndex,
        counters: IdentifierCounters,
        countries: CountryResolver,
        max_cast: usize,
    ) -> Self {
        Self {
            movies,
            people,
            run_cache: HashMap::new(),
            counters,
            countries,
            max_cast,
            stats: RunStats::default(),
        }
    }

    pub fn resolve_movie(&mut self, record: &MovieRecord) -> MovieResolution {
        let key = record.key();
        if let Some(existing_id) = self.movies.get(&key) {
            debug!(title = %key.title, year = key.year, existing_id, "movie already present; skipping");
            self.stats.record_movie_skipped();
            return MovieResolution::Skipped { existing_id };
        }

        let movie_id = self.counters.allocate_movie();
        self.movies.insert(key, movie_id);
        self.stats.record_movie_inserted();

        let movie = MovieRow {
            id: movie_id,
            title: record.title.clone(),
            country: self.countries.resolve(record.country_code.as_deref()),
            year: record.release_year,
            runtime: record.runtime_minutes,
        };

        let mut people = Vec::new();
        let mut credits = Vec::new();
        let mut credited: HashSet<(i64, RoleCode)> = HashSet::new();

        for credit in record.participating_credits(self.max_cast) {
            let Some((resolution, key)) = self.resolve_person(&credit.person) else {
                continue;
            };
            let person_id = resolution.id();
            if let PersonResolution::New(id) = resolution {
                people.push(new_person_row(id, key, &credit.person));
            }
            if credited.insert((person_id, credit.role)) {
                credits.push(CreditRow {
                    movie_id,
                    person_id,
                    role: credit.role,
                });
            }
        }

        MovieResolution::Inserted(ResolvedMovie {
            movie,
            people,
            credits,
        })
    }

    /// `None` when the person cannot be identified (no upstream id, or a name
    /// without a first segment); such credits are dropped.
    pub fn resolve_person(&mut self, person: &PersonRef) -> Option<(PersonResolution, PersonKey)> {
        let Some(source_id) = person.source_id.filter(|id| *id > 0) else {
            debug!(name = %person.full_name, "credit without upstream id; skipping");
            return None;
        };
        let Some(key) = PersonKey::from_full_name(&person.full_name) else {
            debug!(source_id, "credit with unusable name; skipping");
            return None;
        };

        if let Some(&id) = self.run_cache.get(&source_id) {
            trace!(source_id, id, "person cached");
            return Some((PersonResolution::Cached(id), key));
        }

        if let Some(id) = self.people.get(&key) {
            trace!(source_id, id, "person known by name");
            self.run_cache.insert(source_id, id);
            self.stats.record_person_reused();
            return Some((PersonResolution::Known(id), key));
        }

        let id = self.counters.allocate_person();
        trace!(source_id, id, "person new");
        self.run_cache.insert(source_id, id);
        self.people.insert(key.clone(), id);
        self.stats.record_person_inserted();
        Some((PersonResolution::New(id), key))
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn counters(&self) -> IdentifierCounters {
        self.counters
    }
}

fn new_person_row(id: i64, key: PersonKey, person: &PersonRef) -> PersonRow {
    PersonRow {
        id,
        first_name: key.first_name,
        surname: key.surname,
        born: person.birth_year.unwrap_or(0),
        died: person.death_year,
        gender: person.gender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::records::Credit;
    use crate::resolve::keys::MovieKey;
    use indexmap::IndexMap;

    fn person(id: i64, name: &str) -> PersonRef {
        PersonRef {
            source_id: Some(id),
            full_name: name.to_string(),
            gender: Gender::Unknown,
            birth_year: None,
            death_year: None,
        }
    }

    fn movie(title: &str, year: i32, people: Vec<(PersonRef, RoleCode)>) -> MovieRecord {
        MovieRecord {
            source_id: None,
            title: title.to_string(),
            release_year: year,
            runtime_minutes: 90,
            country_code: Some("US".to_string()),
            people: people
                .into_iter()
                .map(|(person, role)| Credit { person, role })
                .collect(),
        }
    }

    fn engine_with(movies: ExistingMovieIndex, people: ExistingPeopleIndex) -> ResolutionEngine {
        let mut overrides = IndexMap::new();
        overrides.insert("GB".to_string(), "gb".to_string());
        ResolutionEngine::new(
            movies,
            people,
            IdentifierCounters::new(9210, 16510),
            CountryResolver::new("us", overrides),
            4,
        )
    }

    fn engine() -> ResolutionEngine {
        engine_with(ExistingMovieIndex::default(), ExistingPeopleIndex::default())
    }

    fn inserted(res: MovieResolution) -> ResolvedMovie {
        match res {
            MovieResolution::Inserted(m) => m,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn existing_movie_is_skipped_without_consuming_ids() {
        let mut movies = ExistingMovieIndex::default();
        movies.insert(MovieKey::new("Parasite", 2019), 500);
        let mut e = engine_with(movies, ExistingPeopleIndex::default());

        let res = e.resolve_movie(&movie(
            "Parasite",
            2019,
            vec![(person(21684, "Bong Joon Ho"), RoleCode::Director)],
        ));

        assert_eq!(res, MovieResolution::Skipped { existing_id: 500 });
        assert_eq!(e.stats().movies_skipped(), 1);
        assert_eq!(e.stats().movies_inserted(), 0);
        assert_eq!(e.counters(), IdentifierCounters::new(9210, 16510));
    }

    #[test]
    fn new_movie_with_new_director() {
        let mut e = engine();
        let m = inserted(e.resolve_movie(&movie(
            "Nobody",
            2021,
            vec![(person(10, "Bob Odenkirk"), RoleCode::Director)],
        )));

        assert_eq!(m.movie.id, 9210);
        assert_eq!(m.movie.country, "us");
        assert_eq!(
            m.people,
            vec![PersonRow {
                id: 16510,
                first_name: "Bob".into(),
                surname: "Odenkirk".into(),
                born: 0,
                died: None,
                gender: Gender::Unknown,
            }]
        );
        assert_eq!(
            m.credits,
            vec![CreditRow {
                movie_id: 9210,
                person_id: 16510,
                role: RoleCode::Director
            }]
        );
    }

    #[test]
    fn second_run_over_same_input_inserts_nothing() {
        let input = vec![
            movie("A", 2020, vec![(person(1, "Ann Lee"), RoleCode::Actor)]),
            movie("B", 2021, vec![(person(2, "Bo Kim"), RoleCode::Actor)]),
        ];
        let mut first = engine();
        let mut exported = ExistingMovieIndex::default();
        for m in &input {
            if let MovieResolution::Inserted(r) = first.resolve_movie(m) {
                exported.insert(MovieKey::new(r.movie.title, r.movie.year), r.movie.id);
            }
        }
        assert_eq!(first.stats().movies_inserted(), 2);

        let mut second = engine_with(exported, ExistingPeopleIndex::default());
        for m in &input {
            assert!(matches!(
                second.resolve_movie(m),
                MovieResolution::Skipped { .. }
            ));
        }
        assert_eq!(second.stats().movies_inserted(), 0);
        assert_eq!(second.stats().movies_skipped(), 2);
    }

    #[test]
    fn duplicate_key_within_run_is_inserted_once() {
        let mut e = engine();
        assert!(matches!(
            e.resolve_movie(&movie("Twice", 2020, vec![])),
            MovieResolution::Inserted(_)
        ));
        assert_eq!(
            e.resolve_movie(&movie("Twice", 2020, vec![])),
            MovieResolution::Skipped { existing_id: 9210 }
        );
    }

    #[test]
    fn ids_are_contiguous_from_seed() {
        let mut e = engine();
        let mut movie_ids = Vec::new();
        let mut person_ids = Vec::new();
        for i in 0..5 {
            let m = inserted(e.resolve_movie(&movie(
                &format!("Film {i}"),
                2020,
                vec![
                    (person(100 + i, &format!("Director N{i}")), RoleCode::Director),
                    (person(200 + i, &format!("Actor N{i}")), RoleCode::Actor),
                ],
            )));
            movie_ids.push(m.movie.id);
            person_ids.extend(m.people.iter().map(|p| p.id));
        }
        assert_eq!(movie_ids, (9210..9215).collect::<Vec<_>>());
        assert_eq!(person_ids, (16510..16520).collect::<Vec<_>>());
        assert_eq!(e.counters(), IdentifierCounters::new(9215, 16520));
    }

    #[test]
    fn cached_person_keeps_id_across_movies() {
        let mut e = engine();
        let first = inserted(e.resolve_movie(&movie(
            "One",
            2020,
            vec![(person(42, "Sam Rivers"), RoleCode::Actor)],
        )));
        // A different spelling under the same upstream id still hits the cache.
        let second = inserted(e.resolve_movie(&movie(
            "Two",
            2021,
            vec![(person(42, "Samuel Rivers"), RoleCode::Actor)],
        )));
        assert_eq!(first.credits[0].person_id, 16510);
        assert_eq!(second.credits[0].person_id, 16510);
        assert!(second.people.is_empty());
        assert_eq!(e.stats().people_inserted(), 1);
        assert_eq!(e.stats().people_reused(), 0);
    }

    #[test]
    fn known_person_is_reused_and_counted_once() {
        let mut people = ExistingPeopleIndex::default();
        people.insert(PersonKey::new("Song", "Kang-ho"), 77);
        let mut e = engine_with(ExistingMovieIndex::default(), people);
        for title in ["One", "Two"] {
            let m = inserted(e.resolve_movie(&movie(
                title,
                2022,
                vec![(person(20, "Song Kang-ho"), RoleCode::Actor)],
            )));
            assert!(m.people.is_empty());
            assert_eq!(m.credits[0].person_id, 77);
        }
        // The second movie resolves through the run cache.
        assert_eq!(e.stats().people_reused(), 1);
        assert_eq!(e.counters().next_person_id(), 16510);
    }

    #[test]
    fn name_collision_collapses_to_one_id() {
        let mut e = engine();
        let m = inserted(e.resolve_movie(&movie(
            "Namesakes",
            2020,
            vec![
                (person(1, "Chris Evans"), RoleCode::Actor),
                (person(2, "Chris Evans"), RoleCode::Actor),
            ],
        )));
        assert_eq!(m.people.len(), 1);
        assert_eq!(m.credits.len(), 1);
        assert_eq!(m.credits[0].person_id, 16510);
        assert_eq!(e.stats().people_reused(), 1);
    }

    #[test]
    fn duplicate_cast_entry_yields_one_credit_per_role() {
        let mut e = engine();
        let m = inserted(e.resolve_movie(&movie(
            "Auteur",
            2020,
            vec![
                (person(5, "Greta Gerwig"), RoleCode::Director),
                (person(5, "Greta Gerwig"), RoleCode::Actor),
                (person(5, "Greta Gerwig"), RoleCode::Actor),
            ],
        )));
        let roles: Vec<_> = m.credits.iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![RoleCode::Director, RoleCode::Actor]);
        assert_eq!(m.people.len(), 1);
    }

    #[test]
    fn unusable_people_are_skipped_without_ids() {
        let mut e = engine();
        let mut nameless = person(9, "   ");
        nameless.gender = Gender::Female;
        let mut no_id = person(0, "Ghost Writer");
        no_id.source_id = None;
        let m = inserted(e.resolve_movie(&movie(
            "Sparse",
            2020,
            vec![
                (nameless, RoleCode::Director),
                (no_id, RoleCode::Actor),
                (person(3, "Real Person"), RoleCode::Actor),
            ],
        )));
        assert_eq!(m.people.len(), 1);
        assert_eq!(m.people[0].id, 16510);
        assert_eq!(m.credits.len(), 1);
    }

    #[test]
    fn only_first_cast_entries_participate() {
        let mut e = engine();
        let cast: Vec<_> = (1..=6)
            .map(|i| (person(i, &format!("Actor Number{i}")), RoleCode::Actor))
            .chain(std::iter::once((person(99, "Late Director"), RoleCode::Director)))
            .collect();
        let m = inserted(e.resolve_movie(&movie("Crowded", 2020, cast)));
        assert_eq!(m.credits.len(), 5);
        assert_eq!(m.credits[0].role, RoleCode::Director);
        assert_eq!(m.people[0].surname, "Director");
    }

    #[test]
    fn enrichment_years_flow_into_person_rows() {
        let mut e = engine();
        let mut p = person(10, "Agnès Varda");
        p.birth_year = Some(1928);
        p.death_year = Some(2019);
        p.gender = Gender::Female;
        let m = inserted(e.resolve_movie(&movie("Visages", 2017, vec![(p, RoleCode::Director)])));
        assert_eq!(m.people[0].born, 1928);
        assert_eq!(m.people[0].died, Some(2019));
        assert_eq!(m.people[0].gender, Gender::Female);
    }
}
