/*!

This is the long-form manual for `survey_tally` and `evcharts`.

## Input formats

Survey responses are read from the exports of the survey form:

* Excel workbooks (`.xlsx`, `.xls`) and OpenDocument spreadsheets (`.ods`)
* delimited text (`.csv`, or any other extension), comma separated by default

The workbook format is always tried first. When the file cannot be opened as a
workbook, it is read again as delimited text.

The first row holds the question labels. Each following row is one response.

## Columns

The queries read fixed columns. The default names are:

| Column             | Used by                    |
|--------------------|----------------------------|
| `Attended`         | `Attendance`               |
| `MembershipStatus` | `Membership Status`, `Sales` |
| `Event`            | grouping of several files  |

Exports that use the full question text as the header can be mapped with the
`columns` section of the configuration file, for instance:

```json
{
  "columns": {
    "attendance": "Will you be in attendance?",
    "membershipStatus": "Are you a member of Waltham Chamber of Commerce"
  }
}
```

## Queries

### `Attendance`

Counts the distinct answers of the attendance column (usually `Yes` / `No`).
A single file is drawn as a pie chart.

### `Membership Status`

Counts the distinct answers of the membership column (usually `Member` /
`Non-member`). A single file is drawn as a pie chart.

### `Sales`

Converts each membership answer into dollars with a fixed rate table:

| Answer       | Reported as   | Rate |
|--------------|---------------|------|
| `Member`     | `Members`     | 15   |
| `Non-member` | `Non-Members` | 20   |

Other answers are skipped (and logged). A single file is drawn as a two-bar
chart.

## Several events

When several files are given, each file is one event. The label of an event is
the one given on the command line (`--label`) or in the configuration file. If
no label was given, the value of the `Event` column is used, and
`Event_1`, `Event_2`, ... otherwise.

All the events are drawn in one grouped bar chart (one cluster per event), or
a stacked bar chart with `--stacked`. Every event shows every category, with a
zero for the answers it does not contain.

## Output files

The chart is written to the output directory (created if needed):

* `{Query}_{Label}.png` for a single file
* `{Query}_Multi.png` for several files

where `{Query}` is `Attendance`, `Membership_Status` or `Sales` and spaces in
the label are replaced by underscores. If the output directory cannot be
created, or the image cannot be written, the run fails with a render error.

## Nothing to chart

A run fails rather than drawing an empty chart when a file has no rows, or
when no answer can be counted: every answer is blank, or for `Sales` no
answer is `Member` or `Non-member`.

 */
